//! Database operations for `collection_batches`.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so a batch
//! can never be completed twice or failed after completion.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `collection_batches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionBatchRow {
    pub id: i64,
    /// Public identifier embedded in product and history rows,
    /// e.g. `sync_domeme_20260321031500123`.
    pub batch_id: String,
    pub source: String,
    pub collection_type: String,
    pub keyword: Option<String>,
    pub max_products: i32,
    pub status: String,
    pub total_found: i32,
    pub total_collected: i32,
    pub successful_collections: i32,
    pub failed_collections: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Final counters written when a batch finishes (or fails part-way).
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchCounts {
    pub total_found: i32,
    pub total_collected: i32,
    pub successful_collections: i32,
    pub failed_collections: i32,
}

const SELECT_COLUMNS: &str = "id, batch_id, source, collection_type, keyword, max_products, \
     status, total_found, total_collected, successful_collections, \
     failed_collections, error_message, started_at, completed_at, created_at";

/// Creates a batch in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_batch(
    pool: &PgPool,
    batch_id: &str,
    source: &str,
    collection_type: &str,
    keyword: Option<&str>,
    max_products: i32,
) -> Result<CollectionBatchRow, DbError> {
    let row = sqlx::query_as::<_, CollectionBatchRow>(&format!(
        "INSERT INTO collection_batches \
             (batch_id, source, collection_type, keyword, max_products) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(batch_id)
    .bind(source)
    .bind(collection_type)
    .bind(keyword)
    .bind(max_products)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a batch as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the batch is not
/// `pending`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_batch(pool: &PgPool, batch_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_batches \
         SET status = 'running', started_at = NOW() \
         WHERE batch_id = $1 AND status = 'pending'",
    )
    .bind(batch_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            batch_id: batch_id.to_string(),
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Marks a batch as `completed` with its final counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the batch is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_batch(
    pool: &PgPool,
    batch_id: &str,
    counts: BatchCounts,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_batches \
         SET status = 'completed', completed_at = NOW(), \
             total_found = $2, total_collected = $3, \
             successful_collections = $4, failed_collections = $5 \
         WHERE batch_id = $1 AND status = 'running'",
    )
    .bind(batch_id)
    .bind(counts.total_found)
    .bind(counts.total_collected)
    .bind(counts.successful_collections)
    .bind(counts.failed_collections)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            batch_id: batch_id.to_string(),
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a batch as `failed`, keeping whatever partial counters were
/// reached before the failure.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the batch is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_batch(
    pool: &PgPool,
    batch_id: &str,
    error_message: &str,
    counts: BatchCounts,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_batches \
         SET status = 'failed', completed_at = NOW(), error_message = $2, \
             total_found = $3, total_collected = $4, \
             successful_collections = $5, failed_collections = $6 \
         WHERE batch_id = $1 AND status = 'running'",
    )
    .bind(batch_id)
    .bind(error_message)
    .bind(counts.total_found)
    .bind(counts.total_collected)
    .bind(counts.successful_collections)
    .bind(counts.failed_collections)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            batch_id: batch_id.to_string(),
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a batch by its public `batch_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_batch(
    pool: &PgPool,
    batch_id: &str,
) -> Result<Option<CollectionBatchRow>, DbError> {
    let row = sqlx::query_as::<_, CollectionBatchRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collection_batches WHERE batch_id = $1"
    ))
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists recent batches, newest first, optionally filtered by source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_batches(
    pool: &PgPool,
    source: Option<&str>,
    limit: i64,
) -> Result<Vec<CollectionBatchRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionBatchRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM collection_batches \
         WHERE ($1::text IS NULL OR source = $1) \
         ORDER BY created_at DESC \
         LIMIT $2"
    ))
    .bind(source)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
