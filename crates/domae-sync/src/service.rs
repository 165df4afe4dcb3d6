//! Incremental collection runs against wholesaler catalogs.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use serde_json::json;
use sqlx::{Acquire, PgConnection, PgPool};

use domae_core::{
    CategoryMapper, CategoryMatch, CollectionType, ProductData, ProductStatus, Supplier,
};
use domae_db::{
    BatchCounts, CollectedProductRow, DbError, NewCollectedProduct, ProductUpdate,
};
use domae_supplier::{SupplierError, WholesalerClient};

use crate::changes;
use crate::result::CollectionResult;
use crate::SyncError;

/// Written rows per transaction before an intermediate commit.
const COMMIT_WINDOW: u32 = 100;

enum ItemOutcome {
    Collected,
    Updated,
    Skipped,
}

/// Runs collection batches: streams a supplier catalog, inserts products
/// it has never seen, refreshes the ones it has, and keeps the batch and
/// history bookkeeping consistent with what was written.
pub struct WholesalerSyncService {
    pool: PgPool,
    mapper: Arc<CategoryMapper>,
    /// Rows older than this get refreshed even when nothing changed.
    refresh_after: Duration,
    /// How long a product stays live without being re-observed.
    retention_days: i64,
}

impl WholesalerSyncService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        mapper: Arc<CategoryMapper>,
        refresh_after_hours: i64,
        retention_days: i64,
    ) -> Self {
        Self {
            pool,
            mapper,
            refresh_after: Duration::hours(refresh_after_hours),
            retention_days,
        }
    }

    /// Collects `collection_type` from the supplier behind `client`,
    /// capped at `max_products`.
    ///
    /// The run is abandoned before any product is written if the
    /// connectivity probe fails. Items the adapter rejects are counted
    /// and skipped; any other stream error aborts the run, keeping the
    /// partial counts on the batch row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connectivity`] on a failed probe,
    /// [`SyncError::Supplier`] when the catalog stream dies mid-run, and
    /// [`SyncError::Db`] if batch or product writes fail.
    pub async fn sync_wholesaler(
        &self,
        client: &WholesalerClient,
        collection_type: &CollectionType,
        max_products: usize,
    ) -> Result<CollectionResult, SyncError> {
        let supplier = client.supplier();
        let batch_id = format!("sync_{}_{}", supplier, Utc::now().format("%Y%m%d%H%M%S%3f"));
        let started = Instant::now();

        domae_db::create_batch(
            &self.pool,
            &batch_id,
            supplier.as_str(),
            collection_type.as_str(),
            collection_type.keyword(),
            i32::try_from(max_products).unwrap_or(i32::MAX),
        )
        .await?;
        domae_db::start_batch(&self.pool, &batch_id).await?;

        tracing::info!(
            batch_id = %batch_id,
            supplier = %supplier,
            collection_type = collection_type.as_str(),
            max_products,
            "starting collection batch"
        );

        let probe = client.test_connection().await;
        if !probe.success {
            domae_db::fail_batch(&self.pool, &batch_id, &probe.message, BatchCounts::default())
                .await?;
            tracing::error!(batch_id = %batch_id, message = %probe.message, "connectivity probe failed");
            return Err(SyncError::Connectivity {
                supplier,
                message: probe.message,
            });
        }

        let mut result = CollectionResult::empty(
            batch_id.clone(),
            supplier,
            collection_type.as_str().to_string(),
        );

        let outcome = self
            .run_stream(client, collection_type, max_products, &batch_id, &mut result)
            .await;
        result.execution_time = started.elapsed();

        match outcome {
            Ok(()) => {
                domae_db::complete_batch(&self.pool, &batch_id, result.batch_counts()).await?;
                tracing::info!(
                    batch_id = %batch_id,
                    total_found = result.total_found,
                    collected = result.collected,
                    updated = result.updated,
                    skipped = result.skipped,
                    failed = result.failed,
                    "collection batch complete"
                );
                Ok(result)
            }
            Err(err) => {
                domae_db::fail_batch(&self.pool, &batch_id, &err.to_string(), result.batch_counts())
                    .await?;
                tracing::error!(batch_id = %batch_id, error = %err, "collection batch failed");
                Err(err)
            }
        }
    }

    async fn run_stream(
        &self,
        client: &WholesalerClient,
        collection_type: &CollectionType,
        max_products: usize,
        batch_id: &str,
        result: &mut CollectionResult,
    ) -> Result<(), SyncError> {
        let supplier = client.supplier();
        let mut stream = client.collect_products(collection_type, max_products);
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let mut window_writes: u32 = 0;

        while let Some(item) = stream.next().await {
            let product = match item {
                Ok(product) => {
                    result.total_found += 1;
                    product
                }
                Err(err @ SupplierError::InvalidItem { .. }) => {
                    result.total_found += 1;
                    result.failed += 1;
                    result.errors.push(err.to_string());
                    tracing::warn!(batch_id, error = %err, "skipping invalid item");
                    continue;
                }
                Err(err) => {
                    // The catalog stream died; keep what this window wrote.
                    tx.commit().await.map_err(DbError::from)?;
                    result.errors.push(err.to_string());
                    return Err(err.into());
                }
            };

            let mut savepoint = (&mut *tx).begin().await.map_err(DbError::from)?;
            match self
                .apply_product(&mut savepoint, supplier, &product, batch_id)
                .await
            {
                Ok(outcome) => {
                    savepoint.commit().await.map_err(DbError::from)?;
                    match outcome {
                        ItemOutcome::Collected => {
                            result.collected += 1;
                            window_writes += 1;
                        }
                        ItemOutcome::Updated => {
                            result.updated += 1;
                            window_writes += 1;
                        }
                        ItemOutcome::Skipped => result.skipped += 1,
                    }
                }
                Err(err) => {
                    savepoint.rollback().await.map_err(DbError::from)?;
                    result.failed += 1;
                    result
                        .errors
                        .push(format!("{}: {err}", product.supplier_product_id));
                    tracing::warn!(
                        batch_id,
                        supplier_product_id = %product.supplier_product_id,
                        error = %err,
                        "failed to persist item"
                    );
                }
            }

            if window_writes >= COMMIT_WINDOW {
                tx.commit().await.map_err(DbError::from)?;
                tracing::info!(
                    batch_id,
                    total_found = result.total_found,
                    collected = result.collected,
                    updated = result.updated,
                    "progress checkpoint"
                );
                tx = self.pool.begin().await.map_err(DbError::from)?;
                window_writes = 0;
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    async fn apply_product(
        &self,
        conn: &mut PgConnection,
        supplier: Supplier,
        product: &ProductData,
        batch_id: &str,
    ) -> Result<ItemOutcome, SyncError> {
        let existing = domae_db::find_product_by_natural_key(
            conn,
            supplier.as_str(),
            &product.supplier_product_id,
        )
        .await?;
        let expires_at = Utc::now() + Duration::days(self.retention_days);

        let Some(current) = existing else {
            let record = self.build_insert(supplier, product, batch_id, expires_at);
            let row = domae_db::insert_collected_product(conn, &record).await?;
            domae_db::insert_product_history(
                conn,
                &changes::new_collection_history(&row, batch_id),
            )
            .await?;
            tracing::debug!(
                product_id = row.id,
                supplier_product_id = %row.supplier_id,
                "collected new product"
            );
            return Ok(ItemOutcome::Collected);
        };

        self.apply_update(conn, supplier, &current, product, batch_id, expires_at)
            .await
    }

    async fn apply_update(
        &self,
        conn: &mut PgConnection,
        supplier: Supplier,
        current: &CollectedProductRow,
        product: &ProductData,
        batch_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ItemOutcome, SyncError> {
        let reactivating = current.status_enum() == ProductStatus::Expired;

        if !reactivating
            && !changes::needs_update(current, product, self.refresh_after, Utc::now())
        {
            return Ok(ItemOutcome::Skipped);
        }

        let detected = changes::detect_changes(current, product);

        if detected.is_empty() && !reactivating {
            // Content matches; only freshness bookkeeping.
            let touched = domae_db::touch_product_freshness(
                conn,
                current.id,
                current.updated_at,
                batch_id,
                expires_at,
            )
            .await?;
            if !touched {
                tracing::debug!(product_id = current.id, "freshness touch lost the update race");
                return Ok(ItemOutcome::Skipped);
            }
            return Ok(ItemOutcome::Updated);
        }

        let status = if reactivating {
            ProductStatus::Collected.as_str().to_string()
        } else {
            current.status.clone()
        };
        let update = self.build_update(supplier, product, status, batch_id, expires_at);

        if domae_db::update_product_observed(conn, current.id, current.updated_at, &update)
            .await?
            .is_none()
        {
            tracing::debug!(product_id = current.id, "update lost the race; skipping");
            return Ok(ItemOutcome::Skipped);
        }

        for change in detected {
            domae_db::insert_product_history(
                conn,
                &changes::history_for_change(current.id, change, batch_id),
            )
            .await?;
        }
        if reactivating {
            domae_db::insert_product_history(
                conn,
                &changes::reactivation_history(current.id, batch_id),
            )
            .await?;
            tracing::info!(product_id = current.id, "reactivated expired product");
        }

        tracing::debug!(product_id = current.id, "updated product");
        Ok(ItemOutcome::Updated)
    }

    fn build_insert(
        &self,
        supplier: Supplier,
        product: &ProductData,
        batch_id: &str,
        expires_at: DateTime<Utc>,
    ) -> NewCollectedProduct {
        let raw_category = product.raw_category();
        let verdict = self
            .mapper
            .map_category(supplier, &raw_category, Some(&product.name));

        NewCollectedProduct {
            source: supplier.as_str().to_string(),
            supplier_id: product.supplier_product_id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            brand: product.brand.clone(),
            category: (!raw_category.is_empty()).then_some(raw_category),
            price: product.retail_price,
            wholesale_price: product.wholesale_price,
            minimum_order_quantity: product.minimum_order_quantity.unwrap_or(1),
            stock_status: product.stock_status().as_str().to_string(),
            stock_quantity: product.stock_quantity,
            main_image_url: product.main_image_url.clone(),
            image_urls: json!(product.additional_images),
            specifications: specifications_json(product),
            attributes: attributes_json(&verdict),
            quality_score: product.quality_score(),
            collection_batch_id: batch_id.to_string(),
            expires_at,
        }
    }

    fn build_update(
        &self,
        supplier: Supplier,
        product: &ProductData,
        status: String,
        batch_id: &str,
        expires_at: DateTime<Utc>,
    ) -> ProductUpdate {
        let raw_category = product.raw_category();
        let verdict = self
            .mapper
            .map_category(supplier, &raw_category, Some(&product.name));

        ProductUpdate {
            name: product.name.clone(),
            description: product.description.clone(),
            brand: product.brand.clone(),
            category: (!raw_category.is_empty()).then_some(raw_category),
            price: product.retail_price,
            wholesale_price: product.wholesale_price,
            minimum_order_quantity: product.minimum_order_quantity.unwrap_or(1),
            stock_status: product.stock_status().as_str().to_string(),
            stock_quantity: product.stock_quantity,
            main_image_url: product.main_image_url.clone(),
            image_urls: json!(product.additional_images),
            specifications: specifications_json(product),
            attributes: attributes_json(&verdict),
            status,
            quality_score: product.quality_score(),
            collection_batch_id: batch_id.to_string(),
            expires_at,
        }
    }

    /// Marks products unseen for the retention window as expired and
    /// records a status-change row for each, under one `cleanup_` batch
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Db`] if the sweep fails; nothing is expired
    /// partially.
    pub async fn expire_stale_products(&self) -> Result<Vec<CollectedProductRow>, SyncError> {
        let cleanup_id = format!("cleanup_{}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let expired = domae_db::expire_stale_products(&mut tx, self.retention_days).await?;
        for row in &expired {
            domae_db::insert_product_history(
                &mut tx,
                &changes::expiry_history(row.id, &cleanup_id, self.retention_days),
            )
            .await?;
        }
        tx.commit().await.map_err(DbError::from)?;

        if !expired.is_empty() {
            tracing::info!(
                count = expired.len(),
                cleanup_id = %cleanup_id,
                "expired stale products"
            );
        }
        Ok(expired)
    }
}

fn specifications_json(product: &ProductData) -> serde_json::Value {
    json!({
        "options": product.options,
        "variants": product.variants,
        "shipping": product.shipping_info,
    })
}

fn attributes_json(verdict: &CategoryMatch) -> serde_json::Value {
    json!({
        "standard_category": verdict.category.as_str(),
        "category_confidence": verdict.confidence,
    })
}
