//! Outcome summary of a single collection run.

use std::time::Duration;

use domae_core::Supplier;
use domae_db::BatchCounts;

/// Counters accumulated over one collection run.
///
/// `total_found` counts every product the supplier reported, including
/// items that failed to parse or persist. `skipped` covers products that
/// were fresh and unchanged, plus updates that lost an `updated_at` race;
/// neither writes anything.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub batch_id: String,
    pub supplier: Supplier,
    pub collection_type: String,
    /// Newly inserted products.
    pub collected: u32,
    /// Existing products refreshed, whether content or just freshness.
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
    pub total_found: u32,
    /// Per-item error messages, in stream order.
    pub errors: Vec<String>,
    pub execution_time: Duration,
}

impl CollectionResult {
    pub(crate) fn empty(batch_id: String, supplier: Supplier, collection_type: String) -> Self {
        Self {
            batch_id,
            supplier,
            collection_type,
            collected: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            total_found: 0,
            errors: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }

    /// Share of found products that ended up written, in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_found == 0 {
            return 0.0;
        }
        f64::from(self.collected + self.updated) / f64::from(self.total_found)
    }

    /// Counter projection persisted on the batch row.
    #[must_use]
    pub fn batch_counts(&self) -> BatchCounts {
        BatchCounts {
            total_found: saturating_i32(self.total_found),
            total_collected: saturating_i32(self.collected),
            successful_collections: saturating_i32(self.collected + self.updated),
            failed_collections: saturating_i32(self.failed),
        }
    }

    /// JSON summary for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "batch_id": self.batch_id,
            "supplier": self.supplier.as_str(),
            "collection_type": self.collection_type,
            "total_found": self.total_found,
            "collected": self.collected,
            "updated": self.updated,
            "skipped": self.skipped,
            "failed": self.failed,
            "success_rate": self.success_rate(),
            "execution_time_secs": self.execution_time.as_secs_f64(),
            "errors": self.errors,
        })
    }
}

fn saturating_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
