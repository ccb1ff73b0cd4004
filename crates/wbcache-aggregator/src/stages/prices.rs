//! Stage 2: seller prices merged onto the group's stored documents.

use std::collections::HashMap;

use futures::future::join_all;
use wbcache_core::{
    PricePatch, ProductDocument, ProductPatch, ProductUpdate, SizePrice, SupplierGroup,
};
use wbcache_wb::GoodsPrice;

use crate::error::AggregatorError;
use crate::pipeline::Aggregator;
use crate::report::PriceStageReport;

#[derive(Debug, Default)]
struct PriceSync {
    goods: usize,
    matched: usize,
    failed_batches: usize,
}

/// Patch for `doc` carrying only the sizes the document already has.
pub(crate) fn price_patch(doc: &ProductDocument, goods: &GoodsPrice) -> PricePatch {
    PricePatch {
        supplier_discount: goods.discount,
        sizes: goods
            .sizes
            .iter()
            .filter(|s| doc.size(s.size_id).is_some())
            .map(|s| SizePrice {
                chrt_id: s.size_id,
                price: s.price,
                discounted_price: s.discounted_price,
            })
            .collect(),
    }
}

impl Aggregator {
    pub(crate) async fn run_price_stage(&self, groups: &[SupplierGroup]) -> PriceStageReport {
        let results = join_all(groups.iter().map(|g| self.sync_prices(g))).await;

        let mut report = PriceStageReport::default();
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(sync) => {
                    report.groups_ok += 1;
                    report.goods += sync.goods;
                    report.prices_matched += sync.matched;
                    report.failed_batches += sync.failed_batches;
                }
                Err(e) => {
                    report.groups_failed += 1;
                    tracing::warn!(
                        stage = "prices",
                        legacy_id = group.legacy_id,
                        supplier_id = group.representative_id,
                        error = %e,
                        "price sync failed for supplier group"
                    );
                }
            }
        }

        tracing::info!(
            stage = "prices",
            groups_ok = report.groups_ok,
            groups_failed = report.groups_failed,
            matched = report.prices_matched,
            "stage complete"
        );
        report
    }

    async fn sync_prices(&self, group: &SupplierGroup) -> Result<PriceSync, AggregatorError> {
        let products = &self.stores.products;
        let known = products.count_by_supplier(group.legacy_id).await?;

        let outcome = self
            .seller_client(&group.api_key)
            .get_all_prices(Some(known))
            .await;
        let by_id: HashMap<i64, &GoodsPrice> =
            outcome.goods.iter().map(|g| (g.nm_id, g)).collect();

        let docs = products.find_by_supplier(group.legacy_id).await?;
        let updates: Vec<ProductUpdate> = docs
            .iter()
            .filter_map(|doc| {
                let goods = by_id.get(&doc.nm_id)?;
                Some(ProductUpdate::new(
                    doc.nm_id,
                    ProductPatch::Price(price_patch(doc, goods)),
                ))
            })
            .collect();

        let matched = updates.len();
        if matched > 0 {
            products.bulk_upsert(updates).await?;
        }

        Ok(PriceSync {
            goods: outcome.goods.len(),
            matched,
            failed_batches: outcome.failed_offsets.len(),
        })
    }
}
