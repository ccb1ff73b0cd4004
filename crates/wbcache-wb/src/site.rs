//! Unauthenticated batch fetcher for the public card API.
//!
//! Ids are packed into `nm=1;2;3` URLs that never exceed the URL budget.
//! Chunks are fetched in parallel and a failed chunk only loses its own ids.

use futures::future::join_all;
use wbcache_core::{PublicSupplier, SitePatch, SiteSize, SiteStock};

use crate::error::WbError;
use crate::http::{WbHttp, WbRequest};
use crate::trace::RequestTrace;
use crate::types::{SiteDetailResponse, SiteProductWire};

/// Longest URL the public card API reliably accepts.
pub const DEFAULT_URL_BUDGET: usize = 4096;

const DETAIL_PATH: &str = "/cards/v2/detail";
const DETAIL_QUERY: &str = "appType=1&curr=rub&dest=-1257786&spp=30";

/// One product as seen by buyers, prices converted to roubles.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProduct {
    pub nm_id: i64,
    pub brand: Option<String>,
    pub name: Option<String>,
    pub supplier_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub sizes: Vec<SiteSize>,
    /// Sum of stock over every size and warehouse.
    pub total_quantity: i64,
}

impl SiteProduct {
    #[must_use]
    pub fn to_patch(&self) -> SitePatch {
        SitePatch {
            supplier_id: self.supplier_id,
            brand: self.brand.clone(),
            title: self.name.clone(),
            sizes: self.sizes.clone(),
            total_quantity: self.total_quantity,
        }
    }

    #[must_use]
    pub fn public_supplier(&self) -> Option<PublicSupplier> {
        match (self.supplier_id, self.supplier_name.as_deref()) {
            (Some(legacy_id), Some(name)) if !name.is_empty() => Some(PublicSupplier {
                legacy_id,
                name: name.to_owned(),
            }),
            _ => None,
        }
    }
}

fn kopecks_to_roubles(kopecks: f64) -> f64 {
    kopecks / 100.0
}

pub(crate) fn transform(wire: SiteProductWire) -> SiteProduct {
    let mut total_quantity = 0i64;
    let sizes = wire
        .sizes
        .into_iter()
        .filter_map(|size| {
            let chrt_id = size.option_id?;
            let stocks: Vec<SiteStock> = size
                .stocks
                .iter()
                .map(|s| SiteStock {
                    warehouse_id: s.wh,
                    quantity: s.qty,
                })
                .collect();
            total_quantity += stocks.iter().map(|s| s.quantity).sum::<i64>();
            Some(SiteSize {
                chrt_id,
                tech_size: size.orig_name,
                wb_size: size.name,
                site_price: size
                    .price
                    .and_then(|p| p.product)
                    .map(kopecks_to_roubles),
                stocks,
            })
        })
        .collect();

    SiteProduct {
        nm_id: wire.id,
        brand: wire.brand,
        name: wire.name,
        supplier_id: wire.supplier_id,
        supplier_name: wire.supplier,
        sizes,
        total_quantity,
    }
}

fn detail_url_prefix(base_url: &str) -> String {
    format!(
        "{}{DETAIL_PATH}?{DETAIL_QUERY}&nm=",
        base_url.trim_end_matches('/')
    )
}

/// Renders the detail URL for `ids`.
#[must_use]
pub fn render_detail_url(base_url: &str, ids: &[i64]) -> String {
    let mut url = detail_url_prefix(base_url);
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            url.push(';');
        }
        url.push_str(&id.to_string());
    }
    url
}

/// Splits `ids` into chunks whose rendered detail URL fits in `budget` chars.
///
/// Order is preserved and every id lands in exactly one chunk. An id that
/// cannot fit even alone still gets a chunk of its own.
#[must_use]
pub fn chunk_ids(base_url: &str, ids: &[i64], budget: usize) -> Vec<Vec<i64>> {
    let prefix_len = detail_url_prefix(base_url).len();
    let mut chunks = Vec::new();
    let mut current: Vec<i64> = Vec::new();
    let mut current_len = prefix_len;

    for &id in ids {
        let id_len = id.to_string().len();
        if !current.is_empty() && current_len + id_len + 1 > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = prefix_len;
        }
        current_len += if current.is_empty() { id_len } else { id_len + 1 };
        current.push(id);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Fetches one chunk of ids from the detail endpoint.
pub(crate) async fn fetch_detail(
    http: &WbHttp,
    ids: &[i64],
    trace: &mut RequestTrace,
) -> Result<Vec<SiteProduct>, WbError> {
    let url = render_detail_url(&http.endpoints().public, ids);
    let request = WbRequest::get(url, format!("public detail for {} ids", ids.len()));
    let response: SiteDetailResponse = http.execute(&request, trace).await?;
    Ok(response.into_products().into_iter().map(transform).collect())
}

#[derive(Debug, Clone)]
pub struct SiteClient {
    http: WbHttp,
    url_budget: usize,
}

impl SiteClient {
    #[must_use]
    pub fn new(http: WbHttp, url_budget: usize) -> Self {
        Self { http, url_budget }
    }

    /// Fetches public data for every id, in parallel chunks.
    ///
    /// Failed chunks are logged and skipped; products the site does not
    /// return are simply absent from the result.
    pub async fn get_products_info(&self, ids: &[i64]) -> (Vec<SiteProduct>, RequestTrace) {
        let mut trace = RequestTrace::new("site products");
        if ids.is_empty() {
            return (Vec::new(), trace);
        }

        let chunks = chunk_ids(&self.http.endpoints().public, ids, self.url_budget);
        let chunk_count = chunks.len();
        let results = join_all(chunks.iter().map(|chunk| async move {
            let mut chunk_trace = RequestTrace::new("site chunk");
            let result = fetch_detail(&self.http, chunk, &mut chunk_trace).await;
            (chunk.len(), result, chunk_trace)
        }))
        .await;

        let mut products = Vec::new();
        let mut failed = 0usize;
        for (size, result, chunk_trace) in results {
            trace.absorb(chunk_trace);
            match result {
                Ok(found) => products.extend(found),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(ids = size, error = %e, "site chunk failed, skipping");
                }
            }
        }

        tracing::info!(
            requested = ids.len(),
            chunks = chunk_count,
            failed_chunks = failed,
            returned = products.len(),
            "site products fetched"
        );
        (products, trace)
    }
}
