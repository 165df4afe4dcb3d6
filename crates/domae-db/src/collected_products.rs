//! Database operations for `collected_products`.
//!
//! Updates that race with other writers (sync batches, the stock monitor)
//! carry an `expected_updated_at` guard; a guard miss returns `Ok(None)` /
//! `Ok(false)` instead of an error so callers can log and skip.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use domae_core::{ProductStatus, StockStatus};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `collected_products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectedProductRow {
    pub id: i64,
    pub source: String,
    pub supplier_id: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Raw supplier category path, segments joined with `" > "`.
    pub category: Option<String>,
    pub price: Decimal,
    /// First retail price ever observed; never overwritten.
    pub original_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub minimum_order_quantity: i32,
    pub stock_status: String,
    pub stock_quantity: Option<i32>,
    pub main_image_url: Option<String>,
    pub image_urls: serde_json::Value,
    pub specifications: serde_json::Value,
    pub attributes: serde_json::Value,
    pub status: String,
    pub quality_score: f64,
    pub collection_batch_id: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CollectedProductRow {
    #[must_use]
    pub fn stock_status_enum(&self) -> StockStatus {
        StockStatus::parse(&self.stock_status)
    }

    #[must_use]
    pub fn status_enum(&self) -> ProductStatus {
        ProductStatus::parse(&self.status)
    }
}

/// Field values for inserting a newly collected product.
#[derive(Debug, Clone)]
pub struct NewCollectedProduct {
    pub source: String,
    pub supplier_id: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub minimum_order_quantity: i32,
    pub stock_status: String,
    pub stock_quantity: Option<i32>,
    pub main_image_url: Option<String>,
    pub image_urls: serde_json::Value,
    pub specifications: serde_json::Value,
    pub attributes: serde_json::Value,
    pub quality_score: f64,
    pub collection_batch_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Field values for refreshing an existing product from a new observation.
///
/// `status` is the post-update lifecycle status: callers pass the current
/// status unchanged except when reactivating an expired row.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub minimum_order_quantity: i32,
    pub stock_status: String,
    pub stock_quantity: Option<i32>,
    pub main_image_url: Option<String>,
    pub image_urls: serde_json::Value,
    pub specifications: serde_json::Value,
    pub attributes: serde_json::Value,
    pub status: String,
    pub quality_score: f64,
    pub collection_batch_id: String,
    pub expires_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, source, supplier_id, name, description, brand, category, \
     price, original_price, wholesale_price, minimum_order_quantity, \
     stock_status, stock_quantity, main_image_url, image_urls, \
     specifications, attributes, status, quality_score, \
     collection_batch_id, collected_at, updated_at, expires_at";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Fetches a product by its natural key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_product_by_natural_key(
    conn: &mut PgConnection,
    source: &str,
    supplier_id: &str,
) -> Result<Option<CollectedProductRow>, DbError> {
    let row = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products \
         WHERE source = $1 AND supplier_id = $2"
    ))
    .bind(source)
    .bind(supplier_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Fetches a product by internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<CollectedProductRow>, DbError> {
    let row = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists products for the read API, newest first, optionally filtered by
/// source and/or lifecycle status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    source: Option<&str>,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products \
         WHERE ($1::text IS NULL OR source = $1) \
           AND ($2::text IS NULL OR status = $2) \
         ORDER BY updated_at DESC \
         LIMIT $3"
    ))
    .bind(source)
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a newly collected product. `original_price` is seeded from the
/// first observed retail price and never rewritten afterwards.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including natural-key
/// conflicts, which callers avoid by looking up first inside the same
/// transaction).
pub async fn insert_collected_product(
    conn: &mut PgConnection,
    new: &NewCollectedProduct,
) -> Result<CollectedProductRow, DbError> {
    let row = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "INSERT INTO collected_products \
             (source, supplier_id, name, description, brand, category, \
              price, original_price, wholesale_price, minimum_order_quantity, \
              stock_status, stock_quantity, main_image_url, image_urls, \
              specifications, attributes, quality_score, collection_batch_id, \
              expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, \
                 $7, $7, $8, $9, \
                 $10, $11, $12, $13, \
                 $14, $15, $16, $17, \
                 $18) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(&new.source)
    .bind(&new.supplier_id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.brand)
    .bind(&new.category)
    .bind(new.price)
    .bind(new.wholesale_price)
    .bind(new.minimum_order_quantity)
    .bind(&new.stock_status)
    .bind(new.stock_quantity)
    .bind(&new.main_image_url)
    .bind(&new.image_urls)
    .bind(&new.specifications)
    .bind(&new.attributes)
    .bind(new.quality_score)
    .bind(&new.collection_batch_id)
    .bind(new.expires_at)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

/// Applies a full observation update, guarded on `updated_at`.
///
/// Returns the updated row, or `None` when another writer touched the row
/// since `expected_updated_at` was read.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_product_observed(
    conn: &mut PgConnection,
    id: i64,
    expected_updated_at: DateTime<Utc>,
    update: &ProductUpdate,
) -> Result<Option<CollectedProductRow>, DbError> {
    let row = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "UPDATE collected_products SET \
             name                   = $3, \
             description            = $4, \
             brand                  = $5, \
             category               = $6, \
             price                  = $7, \
             wholesale_price        = $8, \
             minimum_order_quantity = $9, \
             stock_status           = $10, \
             stock_quantity         = $11, \
             main_image_url         = $12, \
             image_urls             = $13, \
             specifications         = $14, \
             attributes             = $15, \
             status                 = $16, \
             quality_score          = $17, \
             collection_batch_id    = $18, \
             expires_at             = $19, \
             updated_at             = NOW() \
         WHERE id = $1 AND updated_at = $2 \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(id)
    .bind(expected_updated_at)
    .bind(&update.name)
    .bind(&update.description)
    .bind(&update.brand)
    .bind(&update.category)
    .bind(update.price)
    .bind(update.wholesale_price)
    .bind(update.minimum_order_quantity)
    .bind(&update.stock_status)
    .bind(update.stock_quantity)
    .bind(&update.main_image_url)
    .bind(&update.image_urls)
    .bind(&update.specifications)
    .bind(&update.attributes)
    .bind(&update.status)
    .bind(update.quality_score)
    .bind(&update.collection_batch_id)
    .bind(update.expires_at)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Bumps `updated_at`, the batch marker, and the expiry horizon without
/// touching content fields. Used when an observation matched the stored
/// row but the row had gone stale.
///
/// Returns `false` on a guard miss.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_product_freshness(
    conn: &mut PgConnection,
    id: i64,
    expected_updated_at: DateTime<Utc>,
    collection_batch_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE collected_products \
         SET collection_batch_id = $3, expires_at = $4, updated_at = NOW() \
         WHERE id = $1 AND updated_at = $2",
    )
    .bind(id)
    .bind(expected_updated_at)
    .bind(collection_batch_id)
    .bind(expires_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Applies a stock-only observation from the realtime monitor, guarded on
/// `updated_at`. Returns `false` on a guard miss.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_stock_observation(
    conn: &mut PgConnection,
    id: i64,
    expected_updated_at: DateTime<Utc>,
    stock_quantity: Option<i32>,
    stock_status: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE collected_products \
         SET stock_quantity = $3, stock_status = $4, updated_at = NOW() \
         WHERE id = $1 AND updated_at = $2",
    )
    .bind(id)
    .bind(expected_updated_at)
    .bind(stock_quantity)
    .bind(stock_status)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Monitor and job selectors
// ---------------------------------------------------------------------------

/// Products needing a priority stock check: low stock, an active alert
/// subscription, or a change recorded in the last 24 hours.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_priority_products(
    pool: &PgPool,
    low_stock_threshold: i32,
    limit: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products p \
         WHERE p.status IN ('collected', 'sourced') \
           AND ( \
                 (p.stock_quantity IS NOT NULL AND p.stock_quantity <= $1) \
              OR EXISTS (SELECT 1 FROM price_alerts a \
                         WHERE a.product_id = p.id AND a.is_active) \
              OR EXISTS (SELECT 1 FROM product_history h \
                         WHERE h.product_id = p.id \
                           AND h.changed_at > NOW() - INTERVAL '24 hours') \
           ) \
         ORDER BY p.updated_at ASC \
         LIMIT $2"
    ))
    .bind(low_stock_threshold)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Products whose last observation is older than `stale_after_hours`,
/// oldest first. Feeds the monitor's regular pass.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stale_products(
    pool: &PgPool,
    stale_after_hours: i64,
    limit: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products \
         WHERE status IN ('collected', 'sourced') \
           AND updated_at < NOW() - make_interval(hours => $1::int) \
         ORDER BY updated_at ASC \
         LIMIT $2"
    ))
    .bind(stale_after_hours)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// High-quality, in-stock products with recent price movement. Feeds the
/// popular-product refresh and cache warmup jobs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_popular_products(
    pool: &PgPool,
    min_quality_score: f64,
    limit: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products p \
         WHERE p.status IN ('collected', 'sourced') \
           AND p.quality_score >= $1 \
           AND p.stock_status <> 'out_of_stock' \
           AND EXISTS (SELECT 1 FROM product_history h \
                       WHERE h.product_id = p.id \
                         AND h.change_type = 'price_change' \
                         AND h.changed_at > NOW() - INTERVAL '7 days') \
         ORDER BY p.quality_score DESC, p.updated_at DESC \
         LIMIT $2"
    ))
    .bind(min_quality_score)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Products the periodic price sweep should re-examine: anything with an
/// active alert subscription, plus rows not observed in the last
/// `stale_after_hours`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_sweep_products(
    pool: &PgPool,
    stale_after_hours: i64,
    limit: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collected_products p \
         WHERE p.status IN ('collected', 'sourced') \
           AND ( \
                 EXISTS (SELECT 1 FROM price_alerts a \
                         WHERE a.product_id = p.id AND a.is_active) \
              OR p.updated_at < NOW() - make_interval(hours => $1::int) \
           ) \
         ORDER BY p.updated_at ASC \
         LIMIT $2"
    ))
    .bind(stale_after_hours)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks COLLECTED products unseen for `retention_days` as expired and
/// returns the affected rows. SOURCED rows are exempt: a product someone
/// is actively selling never expires out from under them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn expire_stale_products(
    conn: &mut PgConnection,
    retention_days: i64,
) -> Result<Vec<CollectedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedProductRow>(&format!(
        "UPDATE collected_products \
         SET status = 'expired', updated_at = NOW() \
         WHERE status = 'collected' \
           AND updated_at < NOW() - make_interval(days => $1::int) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(retention_days)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Per-status row counts for the status report.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM collected_products GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
