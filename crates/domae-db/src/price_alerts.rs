//! Database operations for `price_alerts`.
//!
//! Subscriptions are created by marketplace-side tooling; this pipeline
//! only reads them and records firings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `price_alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceAlertRow {
    pub id: i64,
    pub product_id: i64,
    pub subscriber: String,
    /// One of `price_drop`, `price_increase`, `back_in_stock`.
    pub alert_type: String,
    pub threshold_percentage: Option<Decimal>,
    pub target_price: Option<Decimal>,
    pub is_active: bool,
    pub last_alerted_at: Option<DateTime<Utc>>,
    pub alert_count: i32,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, product_id, subscriber, alert_type, threshold_percentage, \
     target_price, is_active, last_alerted_at, alert_count, created_at";

/// Creates a subscription. Primarily used by fixtures and ops tooling.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_price_alert(
    pool: &PgPool,
    product_id: i64,
    subscriber: &str,
    alert_type: &str,
    threshold_percentage: Option<Decimal>,
    target_price: Option<Decimal>,
) -> Result<PriceAlertRow, DbError> {
    let row = sqlx::query_as::<_, PriceAlertRow>(&format!(
        "INSERT INTO price_alerts \
             (product_id, subscriber, alert_type, threshold_percentage, target_price) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(subscriber)
    .bind(alert_type)
    .bind(threshold_percentage)
    .bind(target_price)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Active subscriptions for one product, optionally narrowed to a type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_alerts(
    pool: &PgPool,
    product_id: i64,
    alert_type: Option<&str>,
) -> Result<Vec<PriceAlertRow>, DbError> {
    let rows = sqlx::query_as::<_, PriceAlertRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM price_alerts \
         WHERE product_id = $1 AND is_active \
           AND ($2::text IS NULL OR alert_type = $2) \
         ORDER BY id"
    ))
    .bind(product_id)
    .bind(alert_type)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Records that an alert fired: bumps `alert_count` and stamps
/// `last_alerted_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown alert id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_alert_fired(conn: &mut PgConnection, alert_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE price_alerts \
         SET alert_count = alert_count + 1, last_alerted_at = NOW() \
         WHERE id = $1",
    )
    .bind(alert_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound {
            entity: "price alert",
            id: alert_id.to_string(),
        });
    }

    Ok(())
}

/// Deactivates a subscription.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown alert id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_alert(pool: &PgPool, alert_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE price_alerts SET is_active = FALSE WHERE id = $1")
        .bind(alert_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound {
            entity: "price alert",
            id: alert_id.to_string(),
        });
    }

    Ok(())
}
