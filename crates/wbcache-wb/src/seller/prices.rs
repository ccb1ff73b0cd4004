//! Full price-list download.
//!
//! With a product-count hint the list is split into at most five batches and
//! fetched concurrently; without one it is paged sequentially. A failed batch
//! never discards the others: its offset is reported back instead.

use futures::stream::{self, StreamExt};

use crate::error::WbError;
use crate::http::WbRequest;
use crate::trace::RequestTrace;
use crate::types::{GoodsListResponse, GoodsPrice};

use super::SellerClient;

/// Largest `limit` the prices API accepts.
pub const PRICE_PAGE_MAX: u64 = 1_000;

/// Batches in flight at once when the total is known.
pub const PRICE_FAN_OUT: usize = 5;

const MAX_PRICE_PAGES: usize = 1_000;

#[derive(Debug, Clone)]
pub struct PriceListOutcome {
    pub goods: Vec<GoodsPrice>,
    /// Offsets of batches that failed after retries.
    pub failed_offsets: Vec<u64>,
    pub trace: RequestTrace,
}

/// Batch size and start offsets covering `total` goods.
#[must_use]
pub fn plan_price_batches(total: u64) -> (u64, Vec<u64>) {
    let fan_out = PRICE_FAN_OUT as u64;
    let batch = total.div_ceil(fan_out).clamp(1, PRICE_PAGE_MAX);
    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset < total {
        offsets.push(offset);
        offset += batch;
    }
    (batch, offsets)
}

impl SellerClient {
    pub(super) async fn fetch_price_page(
        &self,
        offset: u64,
        limit: u64,
        trace: &mut RequestTrace,
    ) -> Result<Vec<GoodsPrice>, WbError> {
        let url = format!(
            "{}/api/v2/list/goods/filter?limit={limit}&offset={offset}",
            self.http.endpoints().prices
        );
        let request = WbRequest::get(url, format!("prices offset={offset} limit={limit}"))
            .authorized(&self.api_key);
        let response: GoodsListResponse = self.http.execute(&request, trace).await?;
        Ok(response.data.map(|d| d.list_goods).unwrap_or_default())
    }

    /// Downloads every price the key can see.
    ///
    /// `total_products` is a hint (usually the stored product count); the
    /// download continues past it in full pages when the last batch comes
    /// back full.
    pub async fn get_all_prices(&self, total_products: Option<u64>) -> PriceListOutcome {
        let mut outcome = PriceListOutcome {
            goods: Vec::new(),
            failed_offsets: Vec::new(),
            trace: RequestTrace::new("prices list"),
        };

        match total_products.filter(|t| *t > 0) {
            Some(total) => self.fetch_batched(total, &mut outcome).await,
            None => {
                self.fetch_sequential(0, PRICE_PAGE_MAX, &mut outcome)
                    .await;
            }
        }

        tracing::info!(
            goods = outcome.goods.len(),
            failed_batches = outcome.failed_offsets.len(),
            requests = outcome.trace.len(),
            "price list fetched"
        );
        outcome
    }

    async fn fetch_batched(&self, total: u64, outcome: &mut PriceListOutcome) {
        let (batch, offsets) = plan_price_batches(total);
        let last_offset = offsets.last().copied().unwrap_or(0);

        let mut results = stream::iter(offsets)
            .map(|offset| async move {
                let mut trace = RequestTrace::new("prices batch");
                let result = self.fetch_price_page(offset, batch, &mut trace).await;
                (offset, result, trace)
            })
            .buffer_unordered(PRICE_FAN_OUT)
            .collect::<Vec<_>>()
            .await;
        results.sort_by_key(|(offset, _, _)| *offset);

        let mut last_batch_full = false;
        for (offset, result, trace) in results {
            outcome.trace.absorb(trace);
            match result {
                Ok(goods) => {
                    if offset == last_offset {
                        last_batch_full = goods.len() as u64 >= batch;
                    }
                    outcome.goods.extend(goods);
                }
                Err(e) => {
                    tracing::warn!(offset, batch, error = %e, "price batch failed");
                    outcome.failed_offsets.push(offset);
                }
            }
        }

        if last_batch_full {
            tracing::debug!(
                total_hint = total,
                "last price batch was full, continuing past the hint"
            );
            self.fetch_sequential(last_offset + batch, PRICE_PAGE_MAX, outcome)
                .await;
        }
    }

    async fn fetch_sequential(&self, start: u64, page_size: u64, outcome: &mut PriceListOutcome) {
        let mut offset = start;
        for _ in 0..MAX_PRICE_PAGES {
            match self
                .fetch_price_page(offset, page_size, &mut outcome.trace)
                .await
            {
                Ok(goods) => {
                    let received = goods.len() as u64;
                    outcome.goods.extend(goods);
                    if received < page_size {
                        return;
                    }
                    offset += page_size;
                }
                Err(e) => {
                    tracing::warn!(offset, error = %e, "price page failed, stopping");
                    outcome.failed_offsets.push(offset);
                    return;
                }
            }
        }
        tracing::warn!(
            max_pages = MAX_PRICE_PAGES,
            "price pagination ceiling reached, stopping"
        );
    }
}
