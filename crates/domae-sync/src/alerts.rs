//! Alert evaluation and dispatch bookkeeping.
//!
//! There is no outbound notification channel in this pipeline: a
//! "dispatch" logs the event and bumps the subscription's fired counter,
//! which downstream delivery tooling polls.

use domae_db::{CollectedProductRow, DbError, PriceAlertRow, ProductHistoryRow};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::SyncError;

pub(crate) const BACK_IN_STOCK: &str = "back_in_stock";
pub(crate) const PRICE_DROP: &str = "price_drop";
pub(crate) const PRICE_INCREASE: &str = "price_increase";

/// Fires every active back-in-stock subscription on `product`.
///
/// Returns the number of alerts dispatched.
pub(crate) async fn process_back_in_stock(
    pool: &PgPool,
    product: &CollectedProductRow,
) -> Result<u32, SyncError> {
    let alerts = domae_db::list_active_alerts(pool, product.id, Some(BACK_IN_STOCK)).await?;
    if alerts.is_empty() {
        return Ok(0);
    }

    let mut conn = pool.acquire().await.map_err(DbError::from)?;
    for alert in &alerts {
        tracing::info!(
            product_id = product.id,
            alert_id = alert.id,
            subscriber = %alert.subscriber,
            product = %product.name,
            "dispatching back-in-stock alert"
        );
        domae_db::record_alert_fired(&mut conn, alert.id).await?;
    }

    Ok(u32::try_from(alerts.len()).unwrap_or(u32::MAX))
}

/// Whether a price alert should fire for the most recent recorded price
/// change.
///
/// Percentage thresholds compare against the recorded change percentage
/// (drops are negative); a target price compares against the new price.
/// Subscriptions with neither fire on any move in their direction. A
/// change that predates the last dispatch never re-fires.
pub(crate) fn price_alert_triggered(alert: &PriceAlertRow, change: &ProductHistoryRow) -> bool {
    if !alert.is_active {
        return false;
    }
    if alert
        .last_alerted_at
        .is_some_and(|alerted_at| change.changed_at <= alerted_at)
    {
        return false;
    }
    let Some(percentage) = change.price_change_percentage else {
        return false;
    };

    match alert.alert_type.as_str() {
        PRICE_DROP => {
            if percentage >= Decimal::ZERO {
                return false;
            }
            let threshold_hit = alert
                .threshold_percentage
                .is_some_and(|threshold| percentage <= -threshold);
            let target_hit = matches!(
                (alert.target_price, change.new_price),
                (Some(target), Some(new_price)) if new_price <= target
            );
            let unconditional =
                alert.threshold_percentage.is_none() && alert.target_price.is_none();
            threshold_hit || target_hit || unconditional
        }
        PRICE_INCREASE => {
            if percentage <= Decimal::ZERO {
                return false;
            }
            alert
                .threshold_percentage
                .map_or(true, |threshold| percentage >= threshold)
        }
        _ => false,
    }
}

/// Evaluates price subscriptions on one product against its latest
/// recorded price change. Used by the scheduled price sweep.
pub(crate) async fn sweep_price_alerts(
    pool: &PgPool,
    product: &CollectedProductRow,
) -> Result<u32, SyncError> {
    let Some(change) = domae_db::latest_price_change(pool, product.id).await? else {
        return Ok(0);
    };

    let mut fired = 0;
    let mut conn = pool.acquire().await.map_err(DbError::from)?;
    for alert_type in [PRICE_DROP, PRICE_INCREASE] {
        let alerts = domae_db::list_active_alerts(pool, product.id, Some(alert_type)).await?;
        for alert in &alerts {
            if !price_alert_triggered(alert, &change) {
                continue;
            }
            tracing::info!(
                product_id = product.id,
                alert_id = alert.id,
                subscriber = %alert.subscriber,
                alert_type,
                percentage = %change.price_change_percentage.unwrap_or_default(),
                "dispatching price alert"
            );
            domae_db::record_alert_fired(&mut conn, alert.id).await?;
            fired += 1;
        }
    }

    Ok(fired)
}
