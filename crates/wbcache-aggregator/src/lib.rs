pub mod error;
pub mod guard;
pub mod pipeline;
pub mod report;
mod stages;

pub use error::AggregatorError;
pub use guard::{RunFlag, RunGuard};
pub use pipeline::{
    Aggregator, AggregatorSettings, PipelineStores, DEFAULT_CARD_BATCH,
    DEFAULT_ENRICHMENT_BATCH, DEFAULT_ENRICHMENT_CONCURRENCY, DEFAULT_MAX_CARD_BATCHES,
};
pub use report::{
    CardStageReport, EnrichmentStageReport, PriceStageReport, ResolutionReport, RunReport,
    SiteStageReport, TickOutcome,
};
