//! Database operations for the append-only `product_history` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `product_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub change_type: String,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub price_change_amount: Option<Decimal>,
    pub price_change_percentage: Option<Decimal>,
    pub old_stock_quantity: Option<i32>,
    pub new_stock_quantity: Option<i32>,
    pub old_stock_status: Option<String>,
    pub new_stock_status: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub changes_summary: serde_json::Value,
    pub batch_id: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// One history record to append. Only the columns relevant to the change
/// dimension are populated; the rest stay `NULL`.
#[derive(Debug, Clone)]
pub struct NewProductHistory {
    pub product_id: i64,
    pub change_type: String,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub price_change_amount: Option<Decimal>,
    pub price_change_percentage: Option<Decimal>,
    pub old_stock_quantity: Option<i32>,
    pub new_stock_quantity: Option<i32>,
    pub old_stock_status: Option<String>,
    pub new_stock_status: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub changes_summary: serde_json::Value,
    pub batch_id: Option<String>,
}

const SELECT_COLUMNS: &str = "id, product_id, change_type, old_price, new_price, \
     price_change_amount, price_change_percentage, \
     old_stock_quantity, new_stock_quantity, old_stock_status, new_stock_status, \
     old_status, new_status, changes_summary, batch_id, changed_at";

/// Appends one history record.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_product_history(
    conn: &mut PgConnection,
    record: &NewProductHistory,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_history \
             (product_id, change_type, old_price, new_price, \
              price_change_amount, price_change_percentage, \
              old_stock_quantity, new_stock_quantity, \
              old_stock_status, new_stock_status, \
              old_status, new_status, changes_summary, batch_id) \
         VALUES ($1, $2, $3, $4, \
                 $5, $6, \
                 $7, $8, \
                 $9, $10, \
                 $11, $12, $13, $14) \
         RETURNING id",
    )
    .bind(record.product_id)
    .bind(&record.change_type)
    .bind(record.old_price)
    .bind(record.new_price)
    .bind(record.price_change_amount)
    .bind(record.price_change_percentage)
    .bind(record.old_stock_quantity)
    .bind(record.new_stock_quantity)
    .bind(&record.old_stock_status)
    .bind(&record.new_stock_status)
    .bind(&record.old_status)
    .bind(&record.new_status)
    .bind(&record.changes_summary)
    .bind(&record.batch_id)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Recent history for one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_history(
    pool: &PgPool,
    product_id: i64,
    limit: i64,
) -> Result<Vec<ProductHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductHistoryRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM product_history \
         WHERE product_id = $1 \
         ORDER BY changed_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The most recent price change recorded for a product, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_price_change(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductHistoryRow>, DbError> {
    let row = sqlx::query_as::<_, ProductHistoryRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM product_history \
         WHERE product_id = $1 AND change_type = 'price_change' \
         ORDER BY changed_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Counts history rows written under one batch id, optionally narrowed to
/// a change type. Used by status reporting and tests.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_history_for_batch(
    pool: &PgPool,
    batch_id: &str,
    change_type: Option<&str>,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM product_history \
         WHERE batch_id = $1 \
           AND ($2::text IS NULL OR change_type = $2)",
    )
    .bind(batch_id)
    .bind(change_type)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
