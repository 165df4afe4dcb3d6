use domae_core::Supplier;
use domae_db::DbError;
use domae_supplier::SupplierError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors surfaced by collection runs, the stock monitor, and the
/// scheduler.
///
/// Per-item problems during a collection run never show up here; they are
/// counted on the batch and listed in [`CollectionResult::errors`]. This
/// type covers failures that abort an operation outright.
///
/// [`CollectionResult::errors`]: crate::CollectionResult
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connectivity probe failed, so the batch was abandoned before
    /// any products were read.
    #[error("connectivity check failed for {supplier}: {message}")]
    Connectivity { supplier: Supplier, message: String },

    #[error("unknown job id: {job_id}")]
    UnknownJob { job_id: String },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Supplier(#[from] SupplierError),

    #[error(transparent)]
    Schedule(#[from] JobSchedulerError),
}
