//! Collection sync, realtime stock monitoring, and scheduled jobs.
//!
//! [`WholesalerSyncService`] drives incremental collection runs: each
//! batch streams a supplier catalog, inserts unseen products, refreshes
//! known ones, and leaves an audit trail in product history.
//! [`RealtimeStockMonitor`] polls live stock between runs, and
//! [`CollectionScheduler`] hangs both off cron expressions so the whole
//! pipeline runs unattended.

mod alerts;
mod cache;
mod changes;
mod error;
mod monitor;
mod result;
mod scheduler;
mod service;
mod stock;

pub use cache::CacheLayer;
pub use error::SyncError;
pub use monitor::RealtimeStockMonitor;
pub use result::CollectionResult;
pub use scheduler::{CollectionScheduler, JobScheduleInfo};
pub use service::WholesalerSyncService;
pub use stock::{observe_stock, refresh_product_stock, StockObservation};
