//! Stage 1: incremental card sync per supplier group.

use futures::future::join_all;
use wbcache_core::{ProductPatch, ProductUpdate, SupplierGroup};
use wbcache_wb::{card_patch, ProductsQuery};

use crate::error::AggregatorError;
use crate::pipeline::Aggregator;
use crate::report::CardStageReport;

#[derive(Debug, Default)]
struct CardSync {
    cards: usize,
    upserted: usize,
    monitoring_added: u64,
}

impl Aggregator {
    pub(crate) async fn run_card_stage(&self, groups: &[SupplierGroup]) -> CardStageReport {
        let results = join_all(groups.iter().map(|g| self.sync_cards(g))).await;

        let mut report = CardStageReport::default();
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(sync) => {
                    report.groups_ok += 1;
                    report.cards += sync.cards;
                    report.products_upserted += sync.upserted;
                    report.monitoring_added += sync.monitoring_added;
                }
                Err(e) => {
                    report.groups_failed += 1;
                    tracing::warn!(
                        stage = "cards",
                        legacy_id = group.legacy_id,
                        supplier_id = group.representative_id,
                        error = %e,
                        "card sync failed for supplier group"
                    );
                }
            }
        }

        tracing::info!(
            stage = "cards",
            groups_ok = report.groups_ok,
            groups_failed = report.groups_failed,
            cards = report.cards,
            "stage complete"
        );
        report
    }

    /// Pages forward from the newest stored card. Each batch is persisted
    /// before the next is requested, so a failure keeps earlier batches.
    async fn sync_cards(&self, group: &SupplierGroup) -> Result<CardSync, AggregatorError> {
        let client = self.seller_client(&group.api_key);
        let mut cursor = self
            .stores
            .products
            .highest_card_cursor(group.legacy_id)
            .await?
            .map(|c| c.one_past());
        let mut sync = CardSync::default();

        for batch in 1..=self.settings.max_card_batches {
            let outcome = client
                .get_products_list(&ProductsQuery::after(
                    cursor.clone(),
                    self.settings.card_batch,
                ))
                .await?;
            if outcome.cards.is_empty() {
                break;
            }

            let ids: Vec<i64> = outcome.cards.iter().map(|c| c.nm_id).collect();
            let updates: Vec<ProductUpdate> = outcome
                .cards
                .iter()
                .map(|card| {
                    ProductUpdate::new(
                        card.nm_id,
                        ProductPatch::Card(card_patch(card, group.legacy_id)),
                    )
                })
                .collect();

            let summary = self.stores.products.bulk_upsert(updates).await?;
            sync.cards += ids.len();
            sync.upserted += summary.total();
            sync.monitoring_added += self.stores.monitoring.add_ids(&ids).await?;

            tracing::debug!(
                legacy_id = group.legacy_id,
                batch,
                cards = ids.len(),
                "card batch stored"
            );

            if outcome.exhausted || outcome.next_cursor.is_none() || outcome.next_cursor == cursor
            {
                break;
            }
            if batch == self.settings.max_card_batches {
                tracing::warn!(
                    legacy_id = group.legacy_id,
                    max_batches = self.settings.max_card_batches,
                    "card batch ceiling reached, resuming next tick"
                );
            }
            cursor = outcome.next_cursor;
        }

        Ok(sync)
    }
}
