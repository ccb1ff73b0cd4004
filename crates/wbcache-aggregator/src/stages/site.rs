//! Stage 3: public-site refresh of the whole monitoring set, SPP derivation,
//! and the price-history ledger.

use std::collections::HashMap;

use chrono::Utc;
use wbcache_core::{
    history_entry_for, ProductDocument, ProductPatch, ProductUpdate, PublicSupplier,
};

use crate::error::AggregatorError;
use crate::pipeline::Aggregator;
use crate::report::SiteStageReport;

impl Aggregator {
    pub(crate) async fn run_site_stage(&self) -> SiteStageReport {
        let mut report = SiteStageReport::default();
        if let Err(e) = self.sync_site(&mut report).await {
            report.failed = true;
            tracing::error!(stage = "site", error = %e, "site data stage failed");
        }
        tracing::info!(
            stage = "site",
            monitored = report.monitored,
            site_products = report.site_products,
            history_entries = report.history_entries,
            "stage complete"
        );
        report
    }

    async fn sync_site(&self, report: &mut SiteStageReport) -> Result<(), AggregatorError> {
        let ids = self.stores.monitoring.all_ids().await?;
        report.monitored = ids.len();
        if ids.is_empty() {
            return Ok(());
        }

        let (site_products, _trace) = self.site.get_products_info(&ids).await;
        report.site_products = site_products.len();
        if site_products.is_empty() {
            return Ok(());
        }

        let public: Vec<PublicSupplier> = site_products
            .iter()
            .filter_map(wbcache_wb::SiteProduct::public_supplier)
            .collect();
        report.public_suppliers = public.len();
        if !public.is_empty() {
            if let Err(e) = self.stores.public_suppliers.upsert(public).await {
                tracing::warn!(stage = "site", error = %e, "public supplier upsert failed");
            }
        }

        let found: Vec<i64> = site_products.iter().map(|p| p.nm_id).collect();
        let mut docs: HashMap<i64, ProductDocument> = self
            .stores
            .products
            .find_by_ids(&found)
            .await?
            .into_iter()
            .map(|d| (d.nm_id, d))
            .collect();
        let latest = self.stores.history.latest_for(&found).await?;

        // History is classified against the document as it will look after
        // this patch, so the ledger and the stored document agree.
        let now = Utc::now();
        let mut updates = Vec::with_capacity(site_products.len());
        let mut entries = Vec::new();
        for product in &site_products {
            let patch = ProductPatch::Site(product.to_patch());
            let existing = docs.remove(&product.nm_id);
            let merged = ProductDocument::merged(existing, product.nm_id, &patch, now);
            if let Some(entry) = history_entry_for(&merged, latest.get(&product.nm_id), now) {
                entries.push(entry);
            }
            updates.push(ProductUpdate::new(product.nm_id, patch));
        }

        let summary = self.stores.products.bulk_upsert(updates).await?;
        report.products_upserted = summary.total();

        report.history_entries = entries.len();
        if !entries.is_empty() {
            self.stores.history.append(entries).await?;
        }
        Ok(())
    }
}
