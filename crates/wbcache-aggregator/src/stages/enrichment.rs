//! Stage 4: CDN probing for photos and vendor codes the seller APIs lack.

use futures::stream::{self, StreamExt};
use wbcache_core::{EnrichmentPatch, ProductDocument, ProductPatch, ProductUpdate};

use crate::error::AggregatorError;
use crate::pipeline::Aggregator;
use crate::report::EnrichmentStageReport;

impl Aggregator {
    pub(crate) async fn run_enrichment_stage(&self) -> EnrichmentStageReport {
        let mut report = EnrichmentStageReport::default();
        if let Err(e) = self.enrich(&mut report).await {
            report.failed = true;
            tracing::error!(stage = "enrichment", error = %e, "enrichment stage failed");
        }
        tracing::info!(
            stage = "enrichment",
            candidates = report.candidates,
            photos = report.photos_found,
            vendor_codes = report.vendor_codes_found,
            "stage complete"
        );
        report
    }

    async fn enrich(&self, report: &mut EnrichmentStageReport) -> Result<(), AggregatorError> {
        let docs = self
            .stores
            .products
            .find_missing_enrichment(self.settings.enrichment_batch)
            .await?;
        report.candidates = docs.len();
        if docs.is_empty() {
            return Ok(());
        }

        let probes: Vec<_> = docs
            .iter()
            .map(|doc| async move { (doc.nm_id, self.probe_missing(doc).await) })
            .collect();
        let patches: Vec<(i64, EnrichmentPatch)> = stream::iter(probes)
            .buffer_unordered(self.settings.enrichment_concurrency.max(1))
            .collect()
            .await;

        let probed: Vec<i64> = patches.iter().map(|(nm_id, _)| *nm_id).collect();
        if let Err(e) = self.stores.products.mark_enrichment_attempted(&probed).await {
            tracing::warn!(stage = "enrichment", error = %e, "could not record probe attempts");
        }

        let updates: Vec<ProductUpdate> = patches
            .into_iter()
            .filter(|(_, patch)| !patch.is_empty())
            .map(|(nm_id, patch)| {
                if patch.photos.is_some() {
                    report.photos_found += 1;
                }
                if patch.vendor_code.is_some() {
                    report.vendor_codes_found += 1;
                }
                ProductUpdate::new(nm_id, ProductPatch::Enrichment(patch))
            })
            .collect();

        if !updates.is_empty() {
            let summary = self.stores.products.bulk_upsert(updates).await?;
            report.products_upserted = summary.total();
        }
        Ok(())
    }

    /// Probes only the pieces `doc` is missing, both at once.
    async fn probe_missing(&self, doc: &ProductDocument) -> EnrichmentPatch {
        let need_photos = doc.photos.is_none();
        let need_vendor_code = doc.vendor_code.as_deref().is_none_or(str::is_empty);

        let (photos, vendor_code) = tokio::join!(
            async {
                if need_photos {
                    self.prober.find_photos(doc.nm_id).await
                } else {
                    None
                }
            },
            async {
                if need_vendor_code {
                    self.prober.find_vendor_code(doc.nm_id).await
                } else {
                    None
                }
            },
        );
        if photos.is_none() && vendor_code.is_none() {
            tracing::debug!(nm_id = doc.nm_id, "nothing found on the CDN");
        }
        EnrichmentPatch {
            photos,
            vendor_code,
        }
    }
}
