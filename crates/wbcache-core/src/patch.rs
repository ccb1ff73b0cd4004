//! Typed per-stage patches and the single merge function that applies them.
//!
//! Each pipeline stage owns a fixed subset of [`ProductDocument`] fields.
//! A stage can only express a change through its own patch type, so a stage
//! cannot clear a field it does not own. `None` inside a patch always means
//! "leave as is", never "clear".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing;
use crate::product::{Dimensions, Photos, ProductDocument, SiteStock, Size};

/// Size identity as described by the seller card API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSize {
    pub chrt_id: i64,
    pub tech_size: Option<String>,
    pub wb_size: Option<String>,
    pub skus: Vec<String>,
}

/// Stage 1 output: descriptive card data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    pub supplier_id: i64,
    pub brand: Option<String>,
    pub title: Option<String>,
    pub vendor_code: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub photos: Option<Photos>,
    pub sizes: Vec<CardSize>,
    pub card_updated_at: Option<DateTime<Utc>>,
}

/// Seller price for one size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizePrice {
    pub chrt_id: i64,
    pub price: Option<f64>,
    pub discounted_price: Option<f64>,
}

/// Stage 2 output: seller prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePatch {
    pub supplier_discount: Option<f64>,
    pub sizes: Vec<SizePrice>,
}

/// Public-site view of one size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSize {
    pub chrt_id: i64,
    pub tech_size: Option<String>,
    pub wb_size: Option<String>,
    pub site_price: Option<f64>,
    pub stocks: Vec<SiteStock>,
}

/// Stage 3 output: public-site data.
///
/// Discounted seller price and SPP are derived while applying, from the
/// seller fields already on the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePatch {
    pub supplier_id: Option<i64>,
    pub brand: Option<String>,
    pub title: Option<String>,
    pub sizes: Vec<SiteSize>,
    pub total_quantity: i64,
}

/// Stage 4 output: discovered photos and/or vendor code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPatch {
    pub photos: Option<Photos>,
    pub vendor_code: Option<String>,
}

impl EnrichmentPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photos.is_none() && self.vendor_code.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProductPatch {
    Card(CardPatch),
    Price(PricePatch),
    Site(SitePatch),
    Enrichment(EnrichmentPatch),
}

/// A patch addressed to one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub nm_id: i64,
    pub patch: ProductPatch,
}

impl ProductUpdate {
    #[must_use]
    pub fn new(nm_id: i64, patch: ProductPatch) -> Self {
        Self { nm_id, patch }
    }
}

fn set_if_some<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

impl ProductDocument {
    /// Merges `patch` onto the document. `created_at` is never touched.
    pub fn apply(&mut self, patch: &ProductPatch, now: DateTime<Utc>) {
        match patch {
            ProductPatch::Card(p) => self.apply_card(p, now),
            ProductPatch::Price(p) => self.apply_price(p, now),
            ProductPatch::Site(p) => self.apply_site(p, now),
            ProductPatch::Enrichment(p) => self.apply_enrichment(p),
        }
        self.last_updated_at = now;
    }

    /// Applies `patch` to `existing` or to a fresh document when there is none.
    #[must_use]
    pub fn merged(
        existing: Option<ProductDocument>,
        nm_id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> ProductDocument {
        let mut doc = existing.unwrap_or_else(|| ProductDocument::new(nm_id, now));
        doc.apply(patch, now);
        doc
    }

    fn apply_card(&mut self, p: &CardPatch, now: DateTime<Utc>) {
        self.supplier_id = Some(p.supplier_id);
        set_if_some(&mut self.brand, p.brand.as_ref());
        set_if_some(&mut self.title, p.title.as_ref());
        set_if_some(&mut self.vendor_code, p.vendor_code.as_ref());
        set_if_some(&mut self.dimensions, p.dimensions.as_ref());
        set_if_some(&mut self.photos, p.photos.as_ref());

        // The card is authoritative for which sizes exist; price and site
        // fields survive for sizes that keep their chrt_id.
        let previous = std::mem::take(&mut self.sizes);
        self.sizes = p
            .sizes
            .iter()
            .map(|card_size| {
                let mut size = previous
                    .iter()
                    .find(|s| s.chrt_id == card_size.chrt_id)
                    .cloned()
                    .unwrap_or_default();
                size.chrt_id = card_size.chrt_id;
                size.tech_size.clone_from(&card_size.tech_size);
                size.wb_size.clone_from(&card_size.wb_size);
                size.skus.clone_from(&card_size.skus);
                size
            })
            .collect();

        set_if_some(&mut self.card_updated_at, p.card_updated_at.as_ref());
        self.card_data_fetched_at = Some(now);
    }

    fn apply_price(&mut self, p: &PricePatch, now: DateTime<Utc>) {
        set_if_some(&mut self.supplier_discount, p.supplier_discount.as_ref());
        for price in &p.sizes {
            if let Some(size) = self.sizes.iter_mut().find(|s| s.chrt_id == price.chrt_id) {
                set_if_some(&mut size.supplier_price, price.price.as_ref());
                set_if_some(
                    &mut size.supplier_discounted_price,
                    price.discounted_price.as_ref(),
                );
            }
        }
        self.price_data_fetched_at = Some(now);
    }

    fn apply_site(&mut self, p: &SitePatch, now: DateTime<Utc>) {
        set_if_some(&mut self.supplier_id, p.supplier_id.as_ref());
        set_if_some(&mut self.brand, p.brand.as_ref());
        set_if_some(&mut self.title, p.title.as_ref());

        let supplier_discount = self.supplier_discount;
        for site_size in &p.sizes {
            let idx = if let Some(i) = self.sizes.iter().position(|s| s.chrt_id == site_size.chrt_id) {
                i
            } else {
                self.sizes.push(Size {
                    chrt_id: site_size.chrt_id,
                    tech_size: site_size.tech_size.clone(),
                    wb_size: site_size.wb_size.clone(),
                    ..Size::default()
                });
                self.sizes.len() - 1
            };
            let size = &mut self.sizes[idx];
            size.site_price = site_size.site_price;
            size.site_stocks = Some(site_size.stocks.clone());
            if let Some(discounted) = pricing::discounted_price(size.supplier_price, supplier_discount)
            {
                size.supplier_discounted_price = Some(discounted);
            }
            size.site_spp = pricing::site_spp(
                size.site_price,
                size.supplier_discounted_price,
                size.site_spp,
            );
        }

        self.site_total_quantity = Some(p.total_quantity);
        if let Some(first) = self.sizes.first() {
            self.first_size_site_price = first.site_price;
            self.first_size_spp = first.site_spp;
        }
        self.site_data_fetched_at = Some(now);
    }

    fn apply_enrichment(&mut self, p: &EnrichmentPatch) {
        set_if_some(&mut self.photos, p.photos.as_ref());
        set_if_some(&mut self.vendor_code, p.vendor_code.as_ref());
    }
}

#[cfg(test)]
#[path = "patch_test.rs"]
mod tests;
