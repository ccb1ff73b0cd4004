//! Integration tests for the public site fetcher and the CDN prober.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wbcache_wb::probe::basket_path;
use wbcache_wb::site::render_detail_url;
use wbcache_wb::{ImageProber, SiteClient, WbHttp, WbSettings};

fn product_json(id: i64, supplier_id: i64, price_kopecks: i64) -> serde_json::Value {
    json!({
        "id": id,
        "brand": "Brand",
        "name": "Dress",
        "supplier": "OOO Seller",
        "supplierId": supplier_id,
        "sizes": [{
            "name": "M",
            "origName": "46",
            "optionId": id * 10,
            "stocks": [{"wh": 507, "qty": 2}, {"wh": 686, "qty": 1}],
            "price": {"basic": price_kopecks * 2, "product": price_kopecks}
        }]
    })
}

// ---------------------------------------------------------------------------
// SiteClient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_chunk_only_loses_its_own_ids() {
    let server = MockServer::start().await;
    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).unwrap();
    // Budget fits exactly two ids per URL.
    let budget = render_detail_url(&server.uri(), &[1, 2]).len();

    Mock::given(method("GET"))
        .and(path("/cards/v2/detail"))
        .and(query_param("nm", "1;2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"products": [product_json(1, 12345, 42_500), product_json(2, 12345, 10_000)]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cards/v2/detail"))
        .and(query_param("nm", "3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let site = SiteClient::new(http, budget);
    let (products, trace) = site.get_products_info(&[1, 2, 3]).await;

    assert_eq!(products.len(), 2);
    assert_eq!(trace.len(), 2);
    assert_eq!(trace.failures(), 1);
    let first = products.iter().find(|p| p.nm_id == 1).unwrap();
    assert_eq!(first.total_quantity, 3);
    assert_eq!(first.sizes[0].site_price, Some(425.0));
    assert_eq!(first.supplier_id, Some(12345));
}

#[tokio::test]
async fn response_without_data_envelope_is_accepted() {
    let server = MockServer::start().await;
    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).unwrap();
    Mock::given(method("GET"))
        .and(path("/cards/v2/detail"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"products": [product_json(9, 1, 100)]})),
        )
        .mount(&server)
        .await;

    let (products, _) = SiteClient::new(http, 4096).get_products_info(&[9]).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].sizes[0].site_price, Some(1.0));
}

#[tokio::test]
async fn empty_id_list_makes_no_requests() {
    let server = MockServer::start().await;
    let http = WbHttp::new(&WbSettings::for_base_url(&server.uri())).unwrap();
    let (products, trace) = SiteClient::new(http, 4096).get_products_info(&[]).await;
    assert!(products.is_empty());
    assert!(trace.is_empty());
}

// ---------------------------------------------------------------------------
// ImageProber
// ---------------------------------------------------------------------------

const NM_ID: i64 = 123_456_789;

fn asset(nm_id: i64, rest: &str) -> String {
    format!("/{}/{rest}", basket_path(nm_id))
}

fn prober(hosts: &[&MockServer]) -> ImageProber {
    ImageProber::with_hosts(
        Duration::from_secs(3),
        hosts.iter().map(|s| s.uri()).collect(),
        "wbcache-test/0.1",
    )
    .unwrap()
}

#[tokio::test]
async fn photos_found_across_different_shards() {
    let shard_a = MockServer::start().await;
    let shard_b = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(asset(NM_ID, "images/c246x328/1.webp")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&shard_a)
        .await;
    Mock::given(method("HEAD"))
        .and(path(asset(NM_ID, "images/c516x688/1.webp")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&shard_b)
        .await;

    let photos = prober(&[&shard_a, &shard_b])
        .find_photos(NM_ID)
        .await
        .expect("photos");
    assert!(photos.thumbnail.starts_with(&shard_a.uri()));
    assert!(photos.medium.starts_with(&shard_b.uri()));
    assert!(photos.thumbnail.ends_with("/vol1234/part123456/123456789/images/c246x328/1.webp"));
}

#[tokio::test]
async fn thumbnail_without_medium_yields_nothing() {
    let shard = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(asset(NM_ID, "images/c246x328/1.webp")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&shard)
        .await;

    assert!(prober(&[&shard]).find_photos(NM_ID).await.is_none());
}

#[tokio::test]
async fn slow_shard_is_abandoned_after_timeout() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(asset(NM_ID, "info/ru/card.json")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"vendor_code": "SLOW"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;

    let prober = ImageProber::with_hosts(
        Duration::from_millis(200),
        vec![slow.uri()],
        "wbcache-test/0.1",
    )
    .unwrap();
    assert_eq!(prober.find_vendor_code(NM_ID).await, None);
}

#[tokio::test]
async fn vendor_code_read_from_card_json() {
    let missing = MockServer::start().await;
    let serving = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(asset(NM_ID, "info/ru/card.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imt_name": "Dress",
            "vendor_code": "ART-9",
            "nm_id": NM_ID
        })))
        .mount(&serving)
        .await;

    let code = prober(&[&missing, &serving]).find_vendor_code(NM_ID).await;
    assert_eq!(code.as_deref(), Some("ART-9"));
}
