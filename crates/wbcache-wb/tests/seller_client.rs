//! Integration tests for `SellerClient` against a local `wiremock` server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wbcache_core::CardCursor;
use wbcache_wb::{ProductsQuery, RetryPolicy, SellerClient, WbError, WbHttp, WbSettings};

const KEY: &str = "test-api-key";

fn client(server: &MockServer) -> SellerClient {
    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).expect("test WbHttp");
    SellerClient::new(http, KEY)
}

fn client_with_retries(server: &MockServer, max_retries: u32) -> SellerClient {
    let settings = WbSettings {
        retry: RetryPolicy {
            max_retries,
            backoff_base_ms: 0,
        },
        ..WbSettings::for_base_url(&server.uri())
    };
    SellerClient::new(WbHttp::new(&settings).expect("test WbHttp"), KEY)
}

fn card_json(nm_id: i64, updated_at: &str) -> serde_json::Value {
    json!({
        "nmID": nm_id,
        "vendorCode": format!("ART-{nm_id}"),
        "brand": "Brand",
        "title": "Dress",
        "photos": [{
            "big": "https://cdn/big.webp",
            "c246x328": "https://cdn/c246x328.webp",
            "c516x688": "https://cdn/c516x688.webp"
        }],
        "dimensions": {"length": 30, "width": 20, "height": 5, "weightBrutto": 0.4},
        "sizes": [{"chrtID": nm_id * 10, "techSize": "46", "wbSize": "M", "skus": ["200"]}],
        "updatedAt": updated_at
    })
}

fn goods_json(items: &[(i64, f64)]) -> serde_json::Value {
    let goods: Vec<_> = items
        .iter()
        .map(|&(nm_id, price)| {
            json!({
                "nmID": nm_id,
                "vendorCode": format!("ART-{nm_id}"),
                "discount": 50,
                "sizes": [{"sizeID": nm_id * 10, "price": price, "discountedPrice": price / 2.0}]
            })
        })
        .collect();
    json!({"data": {"listGoods": goods}})
}

// ---------------------------------------------------------------------------
// Card list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_card_page_marks_list_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content/v2/get/cards/list"))
        .and(header("Authorization", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [
                card_json(1, "2025-03-01T10:00:00Z"),
                card_json(2, "2025-03-01T11:00:00Z"),
                card_json(3, "2025-03-01T12:00:00Z")
            ],
            "cursor": {"updatedAt": "2025-03-01T12:00:00Z", "nmID": 3, "total": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server)
        .get_products_list(&ProductsQuery::after(None, 1_000))
        .await
        .expect("cards list");

    assert_eq!(outcome.cards.len(), 3);
    assert!(outcome.exhausted);
    assert_eq!(outcome.total_available, Some(3));
    let next = outcome.next_cursor.expect("next cursor");
    assert_eq!(next.nm_id, 3);
    assert_eq!(outcome.trace.len(), 1);
}

#[tokio::test]
async fn resume_cursor_is_sent_in_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content/v2/get/cards/list"))
        .and(body_partial_json(json!({
            "settings": {
                "cursor": {"updatedAt": "2025-03-01T12:00:00.001Z", "nmID": 77},
                "sort": {"ascending": true}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cards": [], "cursor": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let stored = CardCursor {
        updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        nm_id: 77,
    };
    let outcome = client(&server)
        .get_products_list(&ProductsQuery::after(Some(stored.one_past()), 1_000))
        .await
        .expect("cards list");

    assert!(outcome.cards.is_empty());
    assert!(outcome.exhausted);
}

#[tokio::test]
async fn full_pages_continue_until_limit() {
    let server = MockServer::start().await;
    let page: Vec<_> = (1..=100)
        .map(|i| card_json(i, "2025-03-01T10:00:00Z"))
        .collect();
    Mock::given(method("POST"))
        .and(path("/content/v2/get/cards/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": page,
            "cursor": {"updatedAt": "2025-03-01T10:00:00Z", "nmID": 100, "total": 100}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let outcome = client(&server)
        .get_products_list(&ProductsQuery::after(None, 200))
        .await
        .expect("cards list");

    assert_eq!(outcome.cards.len(), 200);
    assert!(!outcome.exhausted);
}

#[tokio::test]
async fn unauthorized_card_request_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content/v2/get/cards/list"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let result = client(&server)
        .get_products_list(&ProductsQuery::after(None, 100))
        .await;
    assert!(
        matches!(result, Err(WbError::Unauthorized { .. })),
        "got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Price list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_total_pages_sequentially() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(1, 1000.0), (2, 500.0)])))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).get_all_prices(None).await;
    assert_eq!(outcome.goods.len(), 2);
    assert!(outcome.failed_offsets.is_empty());
    assert_eq!(outcome.goods[0].sizes[0].price, Some(1000.0));
}

#[tokio::test]
async fn failed_batch_keeps_the_others() {
    let server = MockServer::start().await;
    for (offset, nm_id) in [("0", 1), ("1", 2)] {
        Mock::given(method("GET"))
            .and(path("/api/v2/list/goods/filter"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(nm_id, 100.0)])))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = client(&server).get_all_prices(Some(3)).await;
    let mut ids: Vec<i64> = outcome.goods.iter().map(|g| g.nm_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(outcome.failed_offsets, vec![2]);
}

#[tokio::test]
async fn full_last_batch_continues_past_hint() {
    let server = MockServer::start().await;
    for (offset, nm_id) in [("0", 1), ("1", 2)] {
        Mock::given(method("GET"))
            .and(path("/api/v2/list/goods/filter"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(nm_id, 100.0)])))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("offset", "2"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(3, 100.0)])))
        .expect(1)
        .mount(&server)
        .await;

    // Hint says two products, the seller actually has three.
    let outcome = client(&server).get_all_prices(Some(2)).await;
    assert_eq!(outcome.goods.len(), 3);
    assert!(outcome.failed_offsets.is_empty());
}

#[tokio::test]
async fn low_hint_continues_in_full_pages() {
    let server = MockServer::start().await;
    for (offset, nm_id) in [("0", 1), ("1", 2), ("2", 3)] {
        Mock::given(method("GET"))
            .and(path("/api/v2/list/goods/filter"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(nm_id, 100.0)])))
            .mount(&server)
            .await;
    }
    let full_page: Vec<(i64, f64)> = (100..1_100).map(|nm_id| (nm_id, 100.0)).collect();
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("offset", "3"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&full_page)))
        .expect(1)
        .mount(&server)
        .await;
    let short_page: Vec<(i64, f64)> = (2_000..2_500).map(|nm_id| (nm_id, 100.0)).collect();
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("offset", "1003"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&short_page)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).get_all_prices(Some(3)).await;
    assert_eq!(outcome.goods.len(), 1_503);
    assert!(outcome.failed_offsets.is_empty());
    assert_eq!(outcome.trace.len(), 5);
}

#[tokio::test]
async fn rate_limited_batch_is_retried_after_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(1, 100.0)])))
        .mount(&server)
        .await;

    let outcome = client_with_retries(&server, 3).get_all_prices(None).await;
    assert_eq!(outcome.goods.len(), 1);
    assert!(outcome.failed_offsets.is_empty());
    assert_eq!(outcome.trace.len(), 2);
    assert_eq!(outcome.trace.records[0].status, Some(429));
}

// ---------------------------------------------------------------------------
// Connection, validation, legacy id
// ---------------------------------------------------------------------------

fn jwt(scopes: u64, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"s": scopes, "exp": exp}).to_string());
    format!("{header}.{payload}.c2ln")
}

#[tokio::test]
async fn valid_key_passes_validation() {
    let server = MockServer::start().await;
    let key = jwt((1 << 1) | (1 << 3), 4_000_000_000);
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("Authorization", key.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"TS": "now", "Status": "OK"})))
        .mount(&server)
        .await;

    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).unwrap();
    let report = SellerClient::new(http, &key).validate_api_key().await;
    assert!(report.valid, "reasons: {:?}", report.reasons);
    assert!(report.token.unwrap().has_price_access);
}

#[tokio::test]
async fn key_without_price_scope_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Status": "OK"})))
        .mount(&server)
        .await;

    let key = jwt(1 << 1, 4_000_000_000);
    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).unwrap();
    let report = SellerClient::new(http, &key).validate_api_key().await;
    assert!(!report.valid);
    assert!(report.reasons.iter().any(|r| r.contains("prices")));
}

#[tokio::test]
async fn revoked_key_fails_connection_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client(&server).check_connection().await;
    assert!(matches!(result, Err(WbError::Unauthorized { .. })));
}

#[tokio::test]
async fn legacy_info_reads_supplier_from_public_card() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[(42, 100.0)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cards/v2/detail"))
        .and(query_param("nm", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"products": [{
                "id": 42, "supplier": "OOO Seller", "supplierId": 12345, "sizes": []
            }]}
        })))
        .mount(&server)
        .await;

    let (info, trace) = client(&server)
        .get_supplier_legacy_info()
        .await
        .expect("legacy info");
    assert_eq!(info.supplier_id, 12_345);
    assert_eq!(info.supplier_name.as_deref(), Some("OOO Seller"));
    assert_eq!(trace.len(), 2);
}

#[tokio::test]
async fn legacy_info_on_empty_price_list_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/list/goods/filter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(goods_json(&[])))
        .mount(&server)
        .await;

    let result = client(&server).get_supplier_legacy_info().await;
    assert!(matches!(result, Err(WbError::NoData(_))));
}
