//! Offline unit tests for domae-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chrono::Utc;
use domae_core::{AppConfig, Environment, ProductStatus, StockStatus};
use domae_db::{CollectedProductRow, CollectionBatchRow, PoolConfig, PriceAlertRow};
use rust_decimal::Decimal;
use serde_json::json;

fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example/domae".to_string(),
        env: Environment::Test,
        http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        log_level: "info".to_string(),
        category_table_path: PathBuf::from("./config/categories.yaml"),
        ownerclan_api_key: None,
        domeme_api_key: None,
        gentrade_api_key: None,
        ownerclan_base_url: None,
        domeme_base_url: None,
        gentrade_base_url: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        http_timeout_secs: 30,
        user_agent: "domae-test".to_string(),
        max_retries: 3,
        backoff_base_secs: 2,
        inter_request_delay_ms: 250,
        refresh_after_hours: 24,
        retention_days: 30,
        priority_check_secs: 60,
        regular_check_secs: 300,
        full_sync_cron: "0 0 3 * * *".to_string(),
        popular_refresh_cron: "0 0 */2 * * *".to_string(),
        new_products_cron: "0 0 */4 * * *".to_string(),
        expiry_cleanup_cron: "0 0 2 * * *".to_string(),
        price_sweep_cron: "0 0 */6 * * *".to_string(),
        cache_warmup_cron: "0 0 4 * * *".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&test_app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`CollectedProductRow`] has all
/// expected fields with the correct types, and that the enum accessors
/// parse the stored strings. No database required.
#[test]
fn collected_product_row_has_expected_fields() {
    let row = CollectedProductRow {
        id: 1_i64,
        source: "domeme".to_string(),
        supplier_id: "D-1000".to_string(),
        name: "원피스".to_string(),
        description: None,
        brand: None,
        category: Some("여성패션잡화".to_string()),
        price: Decimal::new(12_000, 0),
        original_price: Some(Decimal::new(12_000, 0)),
        wholesale_price: Some(Decimal::new(8_000, 0)),
        minimum_order_quantity: 1_i32,
        stock_status: "limited".to_string(),
        stock_quantity: Some(4),
        main_image_url: None,
        image_urls: json!([]),
        specifications: json!({}),
        attributes: json!({"standard_category": "fashion_women"}),
        status: "collected".to_string(),
        quality_score: 6.5_f64,
        collection_batch_id: Some("sync_domeme_20260321030000000".to_string()),
        collected_at: Utc::now(),
        updated_at: Utc::now(),
        expires_at: None,
    };

    assert_eq!(row.stock_status_enum(), StockStatus::Limited);
    assert_eq!(row.status_enum(), ProductStatus::Collected);
    assert_eq!(row.price, row.original_price.unwrap());
}

/// Unknown strings in status columns degrade to the lenient defaults
/// instead of panicking.
#[test]
fn row_enum_accessors_tolerate_unknown_strings() {
    let row = CollectedProductRow {
        id: 2_i64,
        source: "ownerclan".to_string(),
        supplier_id: "OC-1".to_string(),
        name: "x".to_string(),
        description: None,
        brand: None,
        category: None,
        price: Decimal::ZERO,
        original_price: None,
        wholesale_price: None,
        minimum_order_quantity: 1,
        stock_status: "mystery".to_string(),
        stock_quantity: None,
        main_image_url: None,
        image_urls: json!([]),
        specifications: json!({}),
        attributes: json!({}),
        status: "mystery".to_string(),
        quality_score: 5.0,
        collection_batch_id: None,
        collected_at: Utc::now(),
        updated_at: Utc::now(),
        expires_at: None,
    };

    assert_eq!(row.stock_status_enum(), StockStatus::Available);
    assert_eq!(row.status_enum(), ProductStatus::Collected);
}

#[test]
fn collection_batch_row_has_expected_fields() {
    let row = CollectionBatchRow {
        id: 3_i64,
        batch_id: "sync_gentrade_20260321040000000".to_string(),
        source: "gentrade".to_string(),
        collection_type: "full".to_string(),
        keyword: None,
        max_products: 50_000_i32,
        status: "pending".to_string(),
        total_found: 0,
        total_collected: 0,
        successful_collections: 0,
        failed_collections: 0,
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.status, "pending");
    assert!(row.started_at.is_none());
    assert!(row.keyword.is_none());
}

#[test]
fn price_alert_row_has_expected_fields() {
    let row = PriceAlertRow {
        id: 4_i64,
        product_id: 1_i64,
        subscriber: "reseller-77".to_string(),
        alert_type: "price_drop".to_string(),
        threshold_percentage: Some(Decimal::new(100, 1)),
        target_price: None,
        is_active: true,
        last_alerted_at: None,
        alert_count: 0,
        created_at: Utc::now(),
    };

    assert!(row.is_active);
    assert_eq!(row.alert_count, 0);
    assert_eq!(row.threshold_percentage, Some(Decimal::new(100, 1)));
}
