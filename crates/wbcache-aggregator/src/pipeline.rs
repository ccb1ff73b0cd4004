//! The [`Aggregator`]: supplier resolution, grouping, and the four stages
//! run in order once per tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wbcache_core::{
    group_by_legacy_id, partition_unresolved, AppConfig, MonitoringSet, PriceHistoryStore,
    ProductStore, PublicSupplierDirectory, ResolvedSupplier, SupplierDirectory, SupplierGroup,
};
use wbcache_wb::{ImageProber, SellerClient, SiteClient, WbError, WbHttp, WbSettings};

use crate::error::AggregatorError;
use crate::guard::RunFlag;
use crate::report::{ResolutionReport, RunReport, TickOutcome};

/// Cards requested per Stage 1 batch; each batch is upserted on its own.
pub const DEFAULT_CARD_BATCH: usize = 1_000;

/// Batches per supplier per tick before Stage 1 gives up until next tick.
pub const DEFAULT_MAX_CARD_BATCHES: usize = 100;

pub const DEFAULT_ENRICHMENT_BATCH: usize = 200;

/// Documents probed at once in Stage 4.
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 10;

/// The storage seams the pipeline writes through.
#[derive(Clone)]
pub struct PipelineStores {
    pub suppliers: Arc<dyn SupplierDirectory>,
    pub products: Arc<dyn ProductStore>,
    pub monitoring: Arc<dyn MonitoringSet>,
    pub history: Arc<dyn PriceHistoryStore>,
    pub public_suppliers: Arc<dyn PublicSupplierDirectory>,
}

impl PipelineStores {
    /// Uses one backend for every seam.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: SupplierDirectory
            + ProductStore
            + MonitoringSet
            + PriceHistoryStore
            + PublicSupplierDirectory
            + 'static,
    {
        Self {
            suppliers: store.clone(),
            products: store.clone(),
            monitoring: store.clone(),
            history: store.clone(),
            public_suppliers: store,
        }
    }
}

impl std::fmt::Debug for PipelineStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStores").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    pub card_batch: usize,
    pub max_card_batches: usize,
    pub enrichment_batch: usize,
    pub enrichment_concurrency: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            card_batch: DEFAULT_CARD_BATCH,
            max_card_batches: DEFAULT_MAX_CARD_BATCHES,
            enrichment_batch: DEFAULT_ENRICHMENT_BATCH,
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
        }
    }
}

impl AggregatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            enrichment_batch: config.enrichment_batch,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    pub(crate) stores: PipelineStores,
    pub(crate) http: WbHttp,
    pub(crate) site: SiteClient,
    pub(crate) prober: ImageProber,
    pub(crate) settings: AggregatorSettings,
    flag: RunFlag,
}

impl Aggregator {
    /// `http` is shared by every seller client and the site fetcher, so all
    /// of them draw from one rate limiter.
    #[must_use]
    pub fn new(
        stores: PipelineStores,
        http: WbHttp,
        site_url_budget: usize,
        prober: ImageProber,
        settings: AggregatorSettings,
    ) -> Self {
        let site = SiteClient::new(http.clone(), site_url_budget);
        Self {
            stores,
            http,
            site,
            prober,
            settings,
            flag: RunFlag::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`WbError`] if an HTTP client cannot be built from `config`.
    pub fn from_app_config(config: &AppConfig, stores: PipelineStores) -> Result<Self, WbError> {
        let http = WbHttp::new(&WbSettings::from_app_config(config))?;
        let prober = ImageProber::new(
            Duration::from_secs(config.probe_timeout_secs),
            config.probe_shards,
            &config.wb_user_agent,
        )?;
        Ok(Self::new(
            stores,
            http,
            config.site_url_budget,
            prober,
            AggregatorSettings::from_app_config(config),
        ))
    }

    #[must_use]
    pub fn run_flag(&self) -> &RunFlag {
        &self.flag
    }

    pub(crate) fn seller_client(&self, api_key: &str) -> SellerClient {
        SellerClient::new(self.http.clone(), api_key)
    }

    /// Runs one full tick unless another is still in progress.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Store`] only if the supplier list cannot be
    /// loaded. Failures inside stages are logged and counted in the report.
    pub async fn run_tick(&self) -> Result<TickOutcome, AggregatorError> {
        let Some(_guard) = self.flag.try_acquire() else {
            tracing::info!("previous pipeline tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };

        let mut report = RunReport::new(Utc::now());

        let groups = self.resolve_groups(&mut report.resolution).await?;
        let groups: Vec<SupplierGroup> = groups.into_values().collect();

        report.cards = self.run_card_stage(&groups).await;
        report.prices = self.run_price_stage(&groups).await;
        report.site = self.run_site_stage().await;
        report.enrichment = self.run_enrichment_stage().await;

        report.finished_at = Utc::now();
        report.log();
        Ok(TickOutcome::Completed(report))
    }

    /// Loads valid suppliers, resolves missing legacy ids, and groups them.
    async fn resolve_groups(
        &self,
        report: &mut ResolutionReport,
    ) -> Result<std::collections::BTreeMap<i64, SupplierGroup>, AggregatorError> {
        let suppliers = self.stores.suppliers.list_active_valid().await?;
        report.suppliers = suppliers.len();

        let (mut resolved, unresolved) = partition_unresolved(suppliers);
        for mut supplier in unresolved {
            match self.resolve_legacy_id(supplier.id, &supplier.api_key).await {
                Ok((legacy_id, legacy_name)) => {
                    supplier.legacy_supplier_id = Some(legacy_id);
                    supplier.legacy_supplier_name = legacy_name;
                    report.resolved += 1;
                    resolved.push(ResolvedSupplier {
                        supplier,
                        legacy_id,
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        supplier_id = supplier.id,
                        error = %e,
                        "could not resolve legacy supplier id, skipping supplier this tick"
                    );
                }
            }
        }

        let groups = group_by_legacy_id(&resolved);
        report.groups = groups.len();
        for group in groups.values() {
            if group.member_ids.len() > 1 {
                tracing::debug!(
                    legacy_id = group.legacy_id,
                    representative_id = group.representative_id,
                    members = ?group.member_ids,
                    "suppliers share one marketplace account"
                );
            }
        }
        Ok(groups)
    }

    async fn resolve_legacy_id(
        &self,
        supplier_id: i64,
        api_key: &str,
    ) -> Result<(i64, Option<String>), AggregatorError> {
        let (info, _trace) = self
            .seller_client(api_key)
            .get_supplier_legacy_info()
            .await?;
        self.stores
            .suppliers
            .persist_resolved_legacy_id(
                supplier_id,
                info.supplier_id,
                info.supplier_name.as_deref(),
            )
            .await?;
        tracing::info!(
            supplier_id,
            legacy_id = info.supplier_id,
            "resolved legacy supplier id"
        );
        Ok((info.supplier_id, info.supplier_name))
    }
}
