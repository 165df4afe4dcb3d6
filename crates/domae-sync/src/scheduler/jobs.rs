//! Bodies of the recurring collection jobs.
//!
//! Jobs run unattended, so failures are logged and swallowed rather than
//! propagated; every run must leave the scheduler healthy.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde_json::json;

use domae_core::{CollectionType, Supplier};
use domae_db::CollectedProductRow;
use domae_supplier::{SupplierError, WholesalerClient};

use super::JobContext;
use crate::alerts;
use crate::stock;

/// Per-supplier cap for the nightly full sync.
const FULL_SYNC_MAX_PRODUCTS: usize = 50_000;
/// Per-supplier cap for the new-arrivals job.
const NEW_PRODUCTS_MAX: usize = 500;
const POPULAR_MIN_QUALITY: f64 = 7.0;
const POPULAR_REFRESH_LIMIT: i64 = 1_000;
/// The price sweep picks up alerted products plus anything this stale.
const PRICE_SWEEP_STALE_HOURS: i64 = 12;
const PRICE_SWEEP_LIMIT: i64 = 2_000;
const CACHE_WARMUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub(super) async fn run_full_sync(ctx: JobContext) {
    for supplier in Supplier::ALL {
        run_collection(&ctx, supplier, CollectionType::Full, FULL_SYNC_MAX_PRODUCTS).await;
    }
}

pub(super) async fn run_new_products(ctx: JobContext) {
    for supplier in Supplier::ALL {
        run_collection(&ctx, supplier, CollectionType::NewArrivals, NEW_PRODUCTS_MAX).await;
    }
}

async fn run_collection(
    ctx: &JobContext,
    supplier: Supplier,
    collection_type: CollectionType,
    max_products: usize,
) {
    let Some(client) = build_client(ctx, supplier) else {
        return;
    };
    match ctx
        .service
        .sync_wholesaler(&client, &collection_type, max_products)
        .await
    {
        Ok(result) => tracing::info!(
            batch_id = %result.batch_id,
            supplier = %supplier,
            collected = result.collected,
            updated = result.updated,
            failed = result.failed,
            "scheduler: collection finished"
        ),
        Err(err) => {
            tracing::error!(supplier = %supplier, error = %err, "scheduler: collection failed");
        }
    }
}

fn build_client(ctx: &JobContext, supplier: Supplier) -> Option<WholesalerClient> {
    match WholesalerClient::build(supplier, &ctx.config) {
        Ok(client) => Some(client),
        Err(SupplierError::MissingCredentials { .. }) => {
            tracing::info!(supplier = %supplier, "scheduler: no credentials configured; skipping");
            None
        }
        Err(err) => {
            tracing::error!(supplier = %supplier, error = %err, "scheduler: could not build client");
            None
        }
    }
}

pub(super) async fn run_popular_refresh(ctx: JobContext) {
    let products = match domae_db::list_popular_products(
        &ctx.pool,
        POPULAR_MIN_QUALITY,
        POPULAR_REFRESH_LIMIT,
    )
    .await
    {
        Ok(products) => products,
        Err(err) => {
            tracing::error!(error = %err, "scheduler: failed to load popular products");
            return;
        }
    };
    if products.is_empty() {
        tracing::info!("scheduler: no popular products to refresh");
        return;
    }

    refresh_stock_for(&ctx, &products, false).await;
}

pub(super) async fn run_price_sweep(ctx: JobContext) {
    let products = match domae_db::list_price_sweep_products(
        &ctx.pool,
        PRICE_SWEEP_STALE_HOURS,
        PRICE_SWEEP_LIMIT,
    )
    .await
    {
        Ok(products) => products,
        Err(err) => {
            tracing::error!(error = %err, "scheduler: failed to load price sweep products");
            return;
        }
    };
    if products.is_empty() {
        tracing::info!("scheduler: nothing to sweep");
        return;
    }

    refresh_stock_for(&ctx, &products, false).await;

    let mut fired = 0;
    for product in &products {
        match alerts::sweep_price_alerts(&ctx.pool, product).await {
            Ok(count) => fired += count,
            Err(err) => {
                tracing::warn!(product_id = product.id, error = %err, "scheduler: price alert sweep failed");
            }
        }
    }
    tracing::info!(products = products.len(), fired, "scheduler: price sweep complete");
}

pub(super) async fn run_expiry_cleanup(ctx: JobContext) {
    match ctx.service.expire_stale_products().await {
        Ok(expired) => {
            tracing::info!(count = expired.len(), "scheduler: expiry cleanup finished");
        }
        Err(err) => tracing::error!(error = %err, "scheduler: expiry cleanup failed"),
    }
}

pub(super) async fn run_cache_warmup(ctx: JobContext) {
    let products = match domae_db::list_popular_products(
        &ctx.pool,
        POPULAR_MIN_QUALITY,
        POPULAR_REFRESH_LIMIT,
    )
    .await
    {
        Ok(products) => products,
        Err(err) => {
            tracing::error!(error = %err, "scheduler: failed to load products for cache warmup");
            return;
        }
    };

    ctx.cache.purge_expired().await;

    let mut by_category: HashMap<String, Vec<i64>> = HashMap::new();
    for product in &products {
        ctx.cache
            .set(
                &format!("collected_product:{}", product.id),
                product_summary(product),
                CACHE_WARMUP_TTL,
            )
            .await;
        if let Some(category) = product.category.clone() {
            by_category.entry(category).or_default().push(product.id);
        }
    }

    let categories = by_category.len();
    for (category, ids) in by_category {
        ctx.cache
            .set(&format!("category:{category}:products"), json!(ids), CACHE_WARMUP_TTL)
            .await;
    }

    tracing::info!(products = products.len(), categories, "scheduler: cache warmed");
}

/// Re-checks live stock for `products`, grouped per supplier so one
/// client is built per group. Suppliers without credentials are skipped.
async fn refresh_stock_for(ctx: &JobContext, products: &[CollectedProductRow], is_priority: bool) {
    let mut groups: HashMap<Supplier, Vec<&CollectedProductRow>> = HashMap::new();
    for product in products {
        match Supplier::from_str(&product.source) {
            Ok(supplier) => groups.entry(supplier).or_default().push(product),
            Err(err) => {
                tracing::warn!(product_id = product.id, error = %err, "scheduler: product has unknown source");
            }
        }
    }

    let delay = Duration::from_millis(ctx.config.inter_request_delay_ms);
    let mut checked = 0usize;

    for (supplier, group) in groups {
        let Some(client) = build_client(ctx, supplier) else {
            continue;
        };
        for product in group {
            match stock::refresh_product_stock(&ctx.pool, &ctx.cache, &client, product, is_priority)
                .await
            {
                Ok(_) => checked += 1,
                Err(err) => {
                    tracing::warn!(product_id = product.id, error = %err, "scheduler: stock refresh failed");
                }
            }
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(checked, "scheduler: stock refresh sweep complete");
}

fn product_summary(product: &CollectedProductRow) -> serde_json::Value {
    json!({
        "id": product.id,
        "source": product.source,
        "supplier_id": product.supplier_id,
        "name": product.name,
        "price": product.price,
        "stock_status": product.stock_status,
        "stock_quantity": product.stock_quantity,
        "quality_score": product.quality_score,
        "main_image_url": product.main_image_url,
    })
}
