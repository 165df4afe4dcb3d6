//! Field-level diffing between a stored product and a fresh observation,
//! plus builders for the history rows each change produces.

use chrono::{DateTime, Duration, Utc};
use domae_core::{ChangeType, ProductData, ProductStatus, StockStatus};
use domae_db::{CollectedProductRow, NewProductHistory};
use rust_decimal::Decimal;
use serde_json::json;

/// One observed difference between the stored row and incoming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProductChange {
    Price {
        old: Decimal,
        new: Decimal,
    },
    Stock {
        old_quantity: Option<i32>,
        new_quantity: Option<i32>,
        old_status: String,
        new_status: String,
    },
    Name {
        old: String,
        new: String,
    },
    MainImage {
        old: Option<String>,
        new: Option<String>,
    },
}

/// Whether an existing row should be rewritten for this observation:
/// price, stock quantity, name, or main image differ, or the row has not
/// been refreshed within `refresh_after`.
pub(crate) fn needs_update(
    row: &CollectedProductRow,
    incoming: &ProductData,
    refresh_after: Duration,
    now: DateTime<Utc>,
) -> bool {
    row.price != incoming.retail_price
        || row.stock_quantity != incoming.stock_quantity
        || row.name != incoming.name
        || row.main_image_url != incoming.main_image_url
        || now - row.updated_at > refresh_after
}

/// Diffs the dimensions that get their own history rows.
pub(crate) fn detect_changes(
    row: &CollectedProductRow,
    incoming: &ProductData,
) -> Vec<ProductChange> {
    let mut changes = Vec::new();

    if row.price != incoming.retail_price {
        changes.push(ProductChange::Price {
            old: row.price,
            new: incoming.retail_price,
        });
    }

    let new_status = incoming.stock_status();
    if row.stock_quantity != incoming.stock_quantity || row.stock_status != new_status.as_str() {
        changes.push(ProductChange::Stock {
            old_quantity: row.stock_quantity,
            new_quantity: incoming.stock_quantity,
            old_status: row.stock_status.clone(),
            new_status: new_status.as_str().to_string(),
        });
    }

    if row.name != incoming.name {
        changes.push(ProductChange::Name {
            old: row.name.clone(),
            new: incoming.name.clone(),
        });
    }

    if row.main_image_url != incoming.main_image_url {
        changes.push(ProductChange::MainImage {
            old: row.main_image_url.clone(),
            new: incoming.main_image_url.clone(),
        });
    }

    changes
}

/// Absolute and percentage delta for a price move. The percentage is
/// relative to the old price, rounded to two decimal places; a zero old
/// price yields a zero percentage rather than a division error.
pub(crate) fn price_change_parts(old: Decimal, new: Decimal) -> (Decimal, Decimal) {
    let amount = new - old;
    let percentage = if old.is_zero() {
        Decimal::ZERO
    } else {
        (amount / old * Decimal::ONE_HUNDRED).round_dp(2)
    };
    (amount, percentage)
}

fn base_history(
    product_id: i64,
    change_type: ChangeType,
    batch_id: Option<String>,
) -> NewProductHistory {
    NewProductHistory {
        product_id,
        change_type: change_type.as_str().to_string(),
        old_price: None,
        new_price: None,
        price_change_amount: None,
        price_change_percentage: None,
        old_stock_quantity: None,
        new_stock_quantity: None,
        old_stock_status: None,
        new_stock_status: None,
        old_status: None,
        new_status: None,
        changes_summary: serde_json::Value::Null,
        batch_id,
    }
}

pub(crate) fn history_for_change(
    product_id: i64,
    change: ProductChange,
    batch_id: &str,
) -> NewProductHistory {
    match change {
        ProductChange::Price { old, new } => {
            let (amount, percentage) = price_change_parts(old, new);
            let mut record = base_history(product_id, ChangeType::PriceChange, Some(batch_id.to_string()));
            record.old_price = Some(old);
            record.new_price = Some(new);
            record.price_change_amount = Some(amount);
            record.price_change_percentage = Some(percentage);
            record.changes_summary = json!({ "field": "price" });
            record
        }
        ProductChange::Stock {
            old_quantity,
            new_quantity,
            old_status,
            new_status,
        } => {
            let mut record = base_history(product_id, ChangeType::StockChange, Some(batch_id.to_string()));
            record.old_stock_quantity = old_quantity;
            record.new_stock_quantity = new_quantity;
            record.old_stock_status = Some(old_status);
            record.new_stock_status = Some(new_status);
            record.changes_summary = json!({ "field": "stock" });
            record
        }
        ProductChange::Name { old, new } => {
            let mut record = base_history(product_id, ChangeType::InfoUpdate, Some(batch_id.to_string()));
            record.changes_summary = json!({ "field": "name", "old": old, "new": new });
            record
        }
        ProductChange::MainImage { old, new } => {
            let mut record = base_history(product_id, ChangeType::InfoUpdate, Some(batch_id.to_string()));
            record.changes_summary = json!({ "field": "main_image_url", "old": old, "new": new });
            record
        }
    }
}

/// History row marking a product's first collection.
pub(crate) fn new_collection_history(
    row: &CollectedProductRow,
    batch_id: &str,
) -> NewProductHistory {
    let mut record = base_history(row.id, ChangeType::NewCollection, Some(batch_id.to_string()));
    record.new_price = Some(row.price);
    record.new_stock_quantity = row.stock_quantity;
    record.new_stock_status = Some(row.stock_status.clone());
    record.new_status = Some(row.status.clone());
    record.changes_summary = json!({
        "event": "new_collection",
        "quality_score": row.quality_score,
    });
    record
}

/// History row for an expired product observed again in a supplier feed.
pub(crate) fn reactivation_history(product_id: i64, batch_id: &str) -> NewProductHistory {
    let mut record = base_history(product_id, ChangeType::StatusChange, Some(batch_id.to_string()));
    record.old_status = Some(ProductStatus::Expired.as_str().to_string());
    record.new_status = Some(ProductStatus::Collected.as_str().to_string());
    record.changes_summary = json!({ "event": "reactivated" });
    record
}

/// History row for a product aged out by the retention cleanup.
pub(crate) fn expiry_history(
    product_id: i64,
    cleanup_id: &str,
    retention_days: i64,
) -> NewProductHistory {
    let mut record = base_history(product_id, ChangeType::StatusChange, Some(cleanup_id.to_string()));
    record.old_status = Some(ProductStatus::Collected.as_str().to_string());
    record.new_status = Some(ProductStatus::Expired.as_str().to_string());
    record.changes_summary = json!({
        "event": "retention_expired",
        "retention_days": retention_days,
    });
    record
}

/// History row for a stock delta seen by the realtime monitor.
pub(crate) fn stock_observation_history(
    row: &CollectedProductRow,
    new_quantity: Option<i32>,
    new_status: StockStatus,
    is_priority: bool,
) -> NewProductHistory {
    let mut record = base_history(row.id, ChangeType::StockChange, None);
    record.old_stock_quantity = row.stock_quantity;
    record.new_stock_quantity = new_quantity;
    record.old_stock_status = Some(row.stock_status.clone());
    record.new_stock_status = Some(new_status.as_str().to_string());
    record.changes_summary = json!({
        "realtime_check": true,
        "is_priority": is_priority,
    });
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_row() -> CollectedProductRow {
        CollectedProductRow {
            id: 1,
            source: "ownerclan".to_string(),
            supplier_id: "OC-1".to_string(),
            name: "스테인리스 텀블러 500ml".to_string(),
            description: Some("보온 보냉 겸용".to_string()),
            brand: None,
            category: Some("주방용품 > 텀블러".to_string()),
            price: Decimal::new(10_000, 0),
            original_price: Some(Decimal::new(10_000, 0)),
            wholesale_price: Some(Decimal::new(7_000, 0)),
            minimum_order_quantity: 1,
            stock_status: "available".to_string(),
            stock_quantity: Some(50),
            main_image_url: Some("https://img.example.com/oc-1.jpg".to_string()),
            image_urls: json!([]),
            specifications: json!({}),
            attributes: json!({}),
            status: "collected".to_string(),
            quality_score: 7.0,
            collection_batch_id: Some("sync_ownerclan_x".to_string()),
            collected_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
        }
    }

    fn incoming() -> ProductData {
        ProductData {
            supplier_product_id: "OC-1".to_string(),
            name: "스테인리스 텀블러 500ml".to_string(),
            description: Some("보온 보냉 겸용".to_string()),
            brand: None,
            wholesale_price: Some(Decimal::new(7_000, 0)),
            retail_price: Decimal::new(10_000, 0),
            stock_quantity: Some(50),
            is_in_stock: true,
            minimum_order_quantity: Some(1),
            main_image_url: Some("https://img.example.com/oc-1.jpg".to_string()),
            additional_images: vec![],
            options: vec![],
            variants: vec![],
            shipping_info: json!({}),
            category_path: vec!["주방용품".to_string(), "텀블러".to_string()],
            raw_data: json!({}),
        }
    }

    #[test]
    fn identical_observation_needs_no_update_while_fresh() {
        let row = stored_row();
        assert!(!needs_update(&row, &incoming(), Duration::hours(24), Utc::now()));
        assert!(detect_changes(&row, &incoming()).is_empty());
    }

    #[test]
    fn staleness_alone_forces_an_update() {
        let mut row = stored_row();
        row.updated_at = Utc::now() - Duration::hours(30);
        assert!(needs_update(&row, &incoming(), Duration::hours(24), Utc::now()));
        assert!(detect_changes(&row, &incoming()).is_empty());
    }

    #[test]
    fn price_move_is_detected_with_both_values() {
        let row = stored_row();
        let mut observed = incoming();
        observed.retail_price = Decimal::new(12_000, 0);

        let changes = detect_changes(&row, &observed);
        assert_eq!(
            changes,
            vec![ProductChange::Price {
                old: Decimal::new(10_000, 0),
                new: Decimal::new(12_000, 0),
            }]
        );
    }

    #[test]
    fn quantity_drop_changes_the_stock_bucket() {
        let row = stored_row();
        let mut observed = incoming();
        observed.stock_quantity = Some(3);

        let changes = detect_changes(&row, &observed);
        match &changes[..] {
            [ProductChange::Stock {
                old_quantity,
                new_quantity,
                old_status,
                new_status,
            }] => {
                assert_eq!(*old_quantity, Some(50));
                assert_eq!(*new_quantity, Some(3));
                assert_eq!(old_status, "available");
                assert_eq!(new_status, "limited");
            }
            other => panic!("expected a single stock change, got: {other:?}"),
        }
    }

    #[test]
    fn price_change_parts_round_to_two_places() {
        let (amount, percentage) =
            price_change_parts(Decimal::new(10_000, 0), Decimal::new(12_000, 0));
        assert_eq!(amount, Decimal::new(2_000, 0));
        assert_eq!(percentage, Decimal::new(20, 0));

        let (amount, percentage) =
            price_change_parts(Decimal::new(30_000, 0), Decimal::new(29_000, 0));
        assert_eq!(amount, Decimal::new(-1_000, 0));
        assert_eq!(percentage, Decimal::new(-333, 2));
    }

    #[test]
    fn zero_old_price_yields_zero_percentage() {
        let (amount, percentage) = price_change_parts(Decimal::ZERO, Decimal::new(5_000, 0));
        assert_eq!(amount, Decimal::new(5_000, 0));
        assert_eq!(percentage, Decimal::ZERO);
    }

    #[test]
    fn price_history_row_carries_the_delta() {
        let record = history_for_change(
            7,
            ProductChange::Price {
                old: Decimal::new(10_000, 0),
                new: Decimal::new(12_000, 0),
            },
            "sync_ownerclan_x",
        );
        assert_eq!(record.change_type, "price_change");
        assert_eq!(record.price_change_amount, Some(Decimal::new(2_000, 0)));
        assert_eq!(record.price_change_percentage, Some(Decimal::new(20, 0)));
        assert_eq!(record.batch_id.as_deref(), Some("sync_ownerclan_x"));
    }

    #[test]
    fn realtime_stock_history_is_tagged() {
        let record = stock_observation_history(&stored_row(), Some(0), StockStatus::OutOfStock, true);
        assert_eq!(record.change_type, "stock_change");
        assert_eq!(record.changes_summary["realtime_check"], true);
        assert_eq!(record.changes_summary["is_priority"], true);
        assert_eq!(record.batch_id, None);
    }
}
