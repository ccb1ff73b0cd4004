pub mod app_config;
pub mod config;
pub mod history;
pub mod patch;
pub mod pricing;
pub mod product;
pub mod stores;
pub mod supplier;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use history::{history_entry_for, HistoryTrigger, PriceHistoryEntry, PricePoint};
pub use patch::{
    CardPatch, CardSize, EnrichmentPatch, PricePatch, ProductPatch, ProductUpdate, SitePatch,
    SiteSize, SizePrice,
};
pub use product::{CardCursor, Dimensions, Photos, ProductDocument, SiteStock, Size};
pub use stores::{
    MonitoringSet, PriceHistoryStore, ProductStore, PublicSupplierDirectory, StoreError,
    SupplierDirectory, UpsertSummary,
};
pub use supplier::{
    group_by_legacy_id, partition_unresolved, PublicSupplier, ResolvedSupplier, Supplier,
    SupplierGroup,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
