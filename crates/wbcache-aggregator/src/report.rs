//! Per-tick counters, serialised into the pipeline run log.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub suppliers: usize,
    pub resolved: usize,
    pub failed: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardStageReport {
    pub groups_ok: usize,
    pub groups_failed: usize,
    pub cards: usize,
    pub products_upserted: usize,
    pub monitoring_added: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceStageReport {
    pub groups_ok: usize,
    pub groups_failed: usize,
    pub goods: usize,
    pub prices_matched: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteStageReport {
    pub monitored: usize,
    pub site_products: usize,
    pub public_suppliers: usize,
    pub products_upserted: usize,
    pub history_entries: usize,
    pub failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStageReport {
    pub candidates: usize,
    pub photos_found: usize,
    pub vendor_codes_found: usize,
    pub products_upserted: usize,
    pub failed: bool,
}

/// What one completed tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resolution: ResolutionReport,
    pub cards: CardStageReport,
    pub prices: PriceStageReport,
    pub site: SiteStageReport,
    pub enrichment: EnrichmentStageReport,
}

impl RunReport {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            resolution: ResolutionReport::default(),
            cards: CardStageReport::default(),
            prices: PriceStageReport::default(),
            site: SiteStageReport::default(),
            enrichment: EnrichmentStageReport::default(),
        }
    }

    /// `true` when any group, stage, or supplier resolution failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.resolution.failed > 0
            || self.cards.groups_failed > 0
            || self.prices.groups_failed > 0
            || self.site.failed
            || self.enrichment.failed
    }

    pub(crate) fn log(&self) {
        let elapsed_ms = (self.finished_at - self.started_at).num_milliseconds();
        tracing::info!(
            elapsed_ms,
            suppliers = self.resolution.suppliers,
            groups = self.resolution.groups,
            unresolved = self.resolution.failed,
            cards = self.cards.cards,
            card_groups_failed = self.cards.groups_failed,
            prices_matched = self.prices.prices_matched,
            price_groups_failed = self.prices.groups_failed,
            site_products = self.site.site_products,
            history_entries = self.site.history_entries,
            enriched = self.enrichment.products_upserted,
            "pipeline tick complete"
        );
    }
}

/// Result of asking for a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick still held the run flag.
    Skipped,
    Completed(RunReport),
}
