//! Applying point-in-time stock observations to stored products.

use sqlx::PgPool;

use domae_core::StockInfo;
use domae_db::{CollectedProductRow, DbError};
use domae_supplier::WholesalerClient;

use crate::alerts;
use crate::cache::CacheLayer;
use crate::changes;
use crate::SyncError;

/// What applying a stock observation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockObservation {
    /// Matched the stored quantity and status; nothing written.
    Unchanged,
    /// Quantity and status written, with a stock-change history row.
    Changed,
    /// Another writer touched the row first; nothing written.
    Conflict,
}

/// Applies one stock observation to `product`.
///
/// A real delta is written guarded on `updated_at`, recorded in history
/// as a realtime check, and the product's cache keys are invalidated. An
/// out-of-stock product coming back in stock additionally runs
/// back-in-stock alert processing.
///
/// # Errors
///
/// Returns [`SyncError::Db`] if any write fails.
pub async fn observe_stock(
    pool: &PgPool,
    cache: &CacheLayer,
    product: &CollectedProductRow,
    stock: StockInfo,
    is_priority: bool,
) -> Result<StockObservation, SyncError> {
    let new_status = stock.status();
    if product.stock_quantity == stock.quantity && product.stock_status == new_status.as_str() {
        return Ok(StockObservation::Unchanged);
    }

    let mut tx = pool.begin().await.map_err(DbError::from)?;
    let written = domae_db::update_stock_observation(
        &mut tx,
        product.id,
        product.updated_at,
        stock.quantity,
        new_status.as_str(),
    )
    .await?;
    if !written {
        tx.rollback().await.map_err(DbError::from)?;
        tracing::debug!(
            product_id = product.id,
            "stock observation lost the update race; skipping"
        );
        return Ok(StockObservation::Conflict);
    }
    domae_db::insert_product_history(
        &mut tx,
        &changes::stock_observation_history(product, stock.quantity, new_status, is_priority),
    )
    .await?;
    tx.commit().await.map_err(DbError::from)?;

    tracing::info!(
        product_id = product.id,
        old_quantity = ?product.stock_quantity,
        new_quantity = ?stock.quantity,
        old_status = %product.stock_status,
        new_status = new_status.as_str(),
        is_priority,
        "stock changed"
    );

    invalidate_product_cache(cache, product).await;

    if !product.stock_status_enum().is_in_stock() && new_status.is_in_stock() {
        alerts::process_back_in_stock(pool, product).await?;
    }

    Ok(StockObservation::Changed)
}

/// Fetches live stock from the supplier and applies it.
///
/// # Errors
///
/// Returns [`SyncError::Supplier`] if the lookup fails and
/// [`SyncError::Db`] if persisting the observation fails.
pub async fn refresh_product_stock(
    pool: &PgPool,
    cache: &CacheLayer,
    client: &WholesalerClient,
    product: &CollectedProductRow,
    is_priority: bool,
) -> Result<StockObservation, SyncError> {
    let stock = client.get_product_stock(&product.supplier_id).await?;
    observe_stock(pool, cache, product, stock, is_priority).await
}

pub(crate) async fn invalidate_product_cache(cache: &CacheLayer, product: &CollectedProductRow) {
    cache
        .clear_pattern(&format!("*collected_product:{}*", product.id))
        .await;
    if let Some(category) = product.category.as_deref() {
        cache.clear_pattern(&format!("*category:{category}*")).await;
    }
}
