//! Integration tests for the supplier clients and the `WholesalerClient`
//! facade.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made. Tests are grouped per supplier and cover
//! each pagination scheme (cursors, numbered pages, offset windows), the
//! per-item error semantics of the collection streams, and every status
//! mapping the clients can propagate.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use domae_core::{AppConfig, CollectionType, Environment, ProductData, Supplier};
use domae_supplier::{
    ClientConfig, DomemeClient, GentradeClient, OwnerclanClient, SupplierError, WholesalerClient,
};

/// Connection settings suitable for tests: 5-second timeout, descriptive UA,
/// no retries, no inter-page delay.
fn test_config() -> ClientConfig {
    ClientConfig {
        api_key: "test-key".to_owned(),
        base_url: None,
        timeout_secs: 5,
        user_agent: "domae-test/0.1".to_owned(),
        max_retries: 0,
        backoff_base_secs: 0,
        inter_request_delay_ms: 0,
    }
}

/// Connection settings with retries enabled for retry-specific tests.
fn test_config_with_retries(max_retries: u32) -> ClientConfig {
    ClientConfig {
        max_retries,
        ..test_config()
    }
}

/// Full application config with every supplier keyed and pointed at `uri`.
fn test_app_config(uri: &str) -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/unused".to_owned(),
        env: Environment::Test,
        http_addr: "127.0.0.1:0".parse().expect("valid socket addr"),
        log_level: "debug".to_owned(),
        category_table_path: "config/categories.yaml".into(),
        ownerclan_api_key: Some("test-key".to_owned()),
        domeme_api_key: Some("test-key".to_owned()),
        gentrade_api_key: Some("test-key".to_owned()),
        ownerclan_base_url: Some(uri.to_owned()),
        domeme_base_url: Some(uri.to_owned()),
        gentrade_base_url: Some(uri.to_owned()),
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        http_timeout_secs: 5,
        user_agent: "domae-test/0.1".to_owned(),
        max_retries: 0,
        backoff_base_secs: 0,
        inter_request_delay_ms: 0,
        refresh_after_hours: 24,
        retention_days: 30,
        priority_check_secs: 60,
        regular_check_secs: 300,
        full_sync_cron: "0 0 3 * * *".to_owned(),
        popular_refresh_cron: "0 0 */2 * * *".to_owned(),
        new_products_cron: "0 0 */4 * * *".to_owned(),
        expiry_cleanup_cron: "0 0 2 * * *".to_owned(),
        price_sweep_cron: "0 0 */6 * * *".to_owned(),
        cache_warmup_cron: "0 0 4 * * *".to_owned(),
    }
}

/// Minimal valid OwnerClan catalog item.
fn ownerclan_item(key: &str) -> serde_json::Value {
    json!({
        "key": key,
        "name": format!("테스트 상품 {key}"),
        "price": 8000,
        "fixed_price": 12000,
        "stock": 30,
        "status": "available",
        "images": ["https://img.example.com/main.jpg"],
        "shipping": {"fee": 3000}
    })
}

fn ownerclan_page(
    items: Vec<serde_json::Value>,
    next_cursor: Option<&str>,
) -> serde_json::Value {
    json!({ "items": items, "next_cursor": next_cursor })
}

/// Minimal valid Domeme catalog item.
fn domeme_item(no: i64) -> serde_json::Value {
    json!({
        "no": no,
        "title": format!("도매 상품 {no}"),
        "supply_price": 4500,
        "sell_price": 6900,
        "stock_qty": 15,
        "sold_out": "N",
        "category_full": "생활용품 > 수납"
    })
}

fn domeme_list_body(total_count: u32, list: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "domeme": {
            "header": { "code": 0, "message": "OK", "total_count": total_count },
            "list": list
        }
    })
}

/// One-product Gentrade catalog window carrying the feed-wide `total`.
fn gentrade_catalog(total: u32, code: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<catalog total="{total}">
  <product>
    <code>{code}</code>
    <name>젠트레이드 상품 {code}</name>
    <supply_price>7000</supply_price>
    <retail_price>9900</retail_price>
    <stock>21</stock>
    <soldout>N</soldout>
  </product>
</catalog>"#
    )
}

/// Drains a collection stream into its elements, `Ok` and `Err` alike.
async fn drain(
    stream: BoxStream<'_, Result<ProductData, SupplierError>>,
) -> Vec<Result<ProductData, SupplierError>> {
    stream.collect().await
}

// ---------------------------------------------------------------------------
// Test 1 – OwnerClan cursor pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_follows_cursor_pagination_across_pages() {
    let server = MockServer::start().await;

    // Page 1: matched only when no cursor param is present, answers with one.
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(bearer_token("test-key"))
        .and(wiremock::matchers::query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&ownerclan_page(
            vec![ownerclan_item("OC-1")],
            Some("cursor-2"),
        )))
        .mount(&server)
        .await;

    // Page 2: the cursor handed out by page 1, no further cursor.
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(query_param("cursor", "cursor-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&ownerclan_page(vec![ownerclan_item("OC-2")], None)),
        )
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 2, "expected 2 products across 2 pages");
    let first = results[0].as_ref().expect("page 1 item should convert");
    let second = results[1].as_ref().expect("page 2 item should convert");
    assert_eq!(first.supplier_product_id, "OC-1", "first product from page 1");
    assert_eq!(
        second.supplier_product_id, "OC-2",
        "second product from page 2"
    );
}

// ---------------------------------------------------------------------------
// Test 2 – malformed catalog entry stays a per-item error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_keeps_streaming_past_a_malformed_item() {
    let server = MockServer::start().await;

    let page = ownerclan_page(
        vec![
            ownerclan_item("OC-1"),
            json!({"name": "키 없는 상품", "price": 1000}),
            ownerclan_item("OC-3"),
        ],
        None,
    );
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page))
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(
        results.len(),
        3,
        "all 3 catalog entries should surface as stream elements"
    );
    assert!(results[0].is_ok(), "first entry should convert");
    assert!(
        matches!(results[1], Err(SupplierError::InvalidItem { .. })),
        "key-less entry should be an InvalidItem error"
    );
    assert!(
        results[2].is_ok(),
        "entry after the bad one should still convert"
    );
}

// ---------------------------------------------------------------------------
// Test 3 – product cap ends the stream without further fetches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_stops_at_the_product_cap_without_fetching_further_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(wiremock::matchers::query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&ownerclan_page(
            vec![ownerclan_item("OC-1"), ownerclan_item("OC-2")],
            Some("cursor-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    // The cursor page must never be requested once the cap is reached.
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(query_param("cursor", "cursor-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&ownerclan_page(Vec::new(), None)),
        )
        .expect(0)
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 2)).await;

    assert_eq!(results.len(), 2, "cap of 2 should end the stream at 2 items");
    assert!(
        results.iter().all(Result::is_ok),
        "both items should convert"
    );
}

// ---------------------------------------------------------------------------
// Test 4 – keyword collection wires the search term through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_keyword_collection_passes_the_search_term() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .and(query_param("search", "텀블러"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&ownerclan_page(vec![ownerclan_item("OC-77")], None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let collection = CollectionType::Keyword("텀블러".to_owned());
    let results = drain(client.collect_products(&collection, 0)).await;

    assert_eq!(results.len(), 1, "expected the keyword page's single item");
    assert!(results[0].is_ok(), "keyword result should convert");
}

// ---------------------------------------------------------------------------
// Test 5 – 401 ends the stream and fails the connection probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_auth_rejection_ends_the_stream_and_fails_the_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(
        results.len(),
        1,
        "a page-level failure should yield exactly one stream element"
    );
    assert!(
        matches!(results[0], Err(SupplierError::AuthRejected { .. })),
        "expected AuthRejected for a 401 response"
    );

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let status = WholesalerClient::Ownerclan(client).test_connection().await;
    assert!(
        !status.success,
        "connection probe should fold the 401 into a failed status"
    );
    assert!(
        status.message.contains("credentials rejected"),
        "probe message should carry the error, got: {}",
        status.message
    );
}

// ---------------------------------------------------------------------------
// Test 6 – per-product stock endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_reads_stock_from_the_per_product_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products/OC-9/stock"))
        .and(bearer_token("test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"quantity": 3, "is_available": true})),
        )
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let stock = client
        .get_product_stock("OC-9")
        .await
        .expect("stock fetch should succeed");

    assert_eq!(stock.quantity, Some(3), "quantity from the stock body");
    assert!(stock.is_available, "availability from the stock body");
}

#[tokio::test]
async fn ownerclan_missing_product_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products/OC-404/stock"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let result = client.get_product_stock("OC-404").await;

    assert!(
        matches!(result, Err(SupplierError::NotFound { .. })),
        "expected NotFound for a 404 response, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Test 7 – 429 rate-limit propagation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ownerclan_propagates_rate_limit_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let client = OwnerclanClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let mut results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 1, "expected one terminal error element");
    match results.remove(0) {
        Err(SupplierError::RateLimited {
            supplier,
            retry_after_secs,
        }) => {
            assert_eq!(supplier, Supplier::Ownerclan);
            assert_eq!(
                retry_after_secs, 7,
                "retry_after_secs should match the Retry-After header"
            );
        }
        other => panic!("expected SupplierError::RateLimited, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 8 – 5xx is retried and the stream recovers
// ---------------------------------------------------------------------------

/// Verifies that a 503 on the first request is retried and the stream
/// completes when the server responds with 200 on the second attempt.
///
/// Uses `wiremock`'s `up_to_n_times` so the 503 is served exactly once,
/// then falls through to the 200 mock.
#[tokio::test]
async fn ownerclan_retries_a_503_and_recovers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&ownerclan_page(vec![ownerclan_item("OC-42")], None)),
        )
        .mount(&server)
        .await;

    // One retry with 0-second backoff so the test doesn't sleep.
    let client = OwnerclanClient::with_base_url(&test_config_with_retries(1), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 1, "expected 1 product after the retry");
    assert!(
        results[0].is_ok(),
        "expected Ok after the 503 retry, got: {:?}",
        results[0]
    );
}

// ---------------------------------------------------------------------------
// Test 9 – Domeme numbered pages driven by total_count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn domeme_pages_through_the_catalog_until_total_count() {
    let server = MockServer::start().await;

    // total_count of 150 keeps pagination going past the 100-item page 1.
    Mock::given(method("GET"))
        .and(path("/open/searchProductList.do"))
        .and(query_param("aid", "test-key"))
        .and(query_param("so", "rd"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&domeme_list_body(
            150,
            vec![domeme_item(1), domeme_item(2)],
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/open/searchProductList.do"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&domeme_list_body(150, vec![domeme_item(3)])),
        )
        .mount(&server)
        .await;

    let client = DomemeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 3, "expected 3 products across 2 pages");
    let ids: Vec<String> = results
        .iter()
        .map(|r| {
            r.as_ref()
                .expect("all entries should convert")
                .supplier_product_id
                .clone()
        })
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"], "product numbers in page order");
}

// ---------------------------------------------------------------------------
// Test 10 – Domeme envelope error code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn domeme_envelope_error_code_becomes_an_api_error() {
    let server = MockServer::start().await;

    let body = json!({
        "domeme": {
            "header": { "code": 901, "message": "인증키 오류" },
            "list": []
        }
    });
    Mock::given(method("GET"))
        .and(path("/open/searchProductList.do"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = DomemeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let mut results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 1, "expected one terminal error element");
    match results.remove(0) {
        Err(SupplierError::ApiError(message)) => {
            assert!(
                message.contains("domeme code 901") && message.contains("인증키 오류"),
                "error should carry the envelope code and message, got: {message}"
            );
        }
        other => panic!("expected SupplierError::ApiError, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 11 – Domeme stock through the item view
// ---------------------------------------------------------------------------

#[tokio::test]
async fn domeme_reads_stock_through_the_item_view() {
    let server = MockServer::start().await;

    let body = json!({
        "domeme": {
            "header": { "code": 0 },
            "item": { "no": 772001, "stock_qty": 0, "sold_out": "Y" }
        }
    });
    Mock::given(method("GET"))
        .and(path("/open/productView.do"))
        .and(query_param("aid", "test-key"))
        .and(query_param("no", "772001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = DomemeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let stock = client
        .get_product_stock("772001")
        .await
        .expect("stock fetch should succeed");

    assert_eq!(stock.quantity, Some(0), "stock_qty from the item view");
    assert!(!stock.is_available, "sold_out=Y should read as unavailable");
}

#[tokio::test]
async fn domeme_item_view_without_an_item_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/open/productView.do"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"domeme": {"header": {"code": 0}, "list": []}})),
        )
        .mount(&server)
        .await;

    let client = DomemeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let result = client.get_product_stock("999").await;

    match result {
        Err(SupplierError::ApiError(message)) => {
            assert!(
                message.contains("no item"),
                "error should name the empty item view, got: {message}"
            );
        }
        other => panic!("expected SupplierError::ApiError, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 12 – Gentrade offset windows driven by the feed total
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gentrade_walks_offset_windows_until_the_feed_total() {
    let server = MockServer::start().await;

    // The window size is 200; a total of 201 forces exactly two windows.
    Mock::given(method("GET"))
        .and(path("/api/catalog.xml"))
        .and(query_param("key", "test-key"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(gentrade_catalog(201, "GT-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/catalog.xml"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_string(gentrade_catalog(201, "GT-2")))
        .mount(&server)
        .await;

    let client = GentradeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let results = drain(client.collect_products(&CollectionType::Full, 0)).await;

    assert_eq!(results.len(), 2, "expected 2 products across 2 windows");
    let first = results[0].as_ref().expect("window 1 item should convert");
    let second = results[1].as_ref().expect("window 2 item should convert");
    assert_eq!(first.supplier_product_id, "GT-1");
    assert_eq!(second.supplier_product_id, "GT-2");
}

// ---------------------------------------------------------------------------
// Test 13 – Gentrade stock document
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gentrade_parses_stock_attributes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stock.xml"))
        .and(query_param("key", "test-key"))
        .and(query_param("code", "GT-9"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="utf-8"?><stock code="GT-9" quantity="5" available="Y"/>"#,
        ))
        .mount(&server)
        .await;

    let client = GentradeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let stock = client
        .get_product_stock("GT-9")
        .await
        .expect("stock fetch should succeed");

    assert_eq!(stock.quantity, Some(5), "quantity attribute");
    assert!(stock.is_available, "available=Y should read as available");
}

#[tokio::test]
async fn gentrade_body_without_a_stock_element_is_an_xml_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stock.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<error>unknown code</error>"),
        )
        .mount(&server)
        .await;

    let client = GentradeClient::with_base_url(&test_config(), &server.uri())
        .expect("failed to build test client");
    let result = client.get_product_stock("GT-404").await;

    match result {
        Err(SupplierError::Xml { reason, .. }) => {
            assert!(
                reason.contains("no <stock> element"),
                "error should name the missing element, got: {reason}"
            );
        }
        other => panic!("expected SupplierError::Xml, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 14 – facade construction requires credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wholesaler_build_requires_an_api_key() {
    let mut config = test_app_config("http://127.0.0.1:9");
    config.domeme_api_key = None;

    let err = WholesalerClient::build(Supplier::Domeme, &config)
        .expect_err("build without a key must fail");
    match err {
        SupplierError::MissingCredentials { supplier } => {
            assert_eq!(supplier, Supplier::Domeme);
        }
        other => panic!("expected SupplierError::MissingCredentials, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 15 – facade probe against a reachable supplier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wholesaler_probe_reports_a_reachable_supplier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&ownerclan_page(vec![ownerclan_item("OC-1")], None)),
        )
        .mount(&server)
        .await;

    let config = test_app_config(&server.uri());
    let client = WholesalerClient::build(Supplier::Ownerclan, &config)
        .expect("build with a configured key should succeed");
    assert_eq!(client.supplier(), Supplier::Ownerclan);

    let status = client.test_connection().await;
    assert!(
        status.success,
        "expected a reachable status, got: {}",
        status.message
    );
    assert_eq!(status.message, "ownerclan reachable");
}
