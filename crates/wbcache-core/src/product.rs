//! The canonical per-product document kept in the product cache.
//!
//! One [`ProductDocument`] exists per marketplace product id (`nmId`). Four
//! pipeline stages write disjoint field subsets onto it through the typed
//! patches in [`crate::patch`]; nothing outside that module mutates a stored
//! document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Small and medium photo URLs for the product's first image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photos {
    pub thumbnail: String,
    pub medium: String,
}

/// Package dimensions in centimetres as reported by the card API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub length: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Gross weight in kilograms.
    pub weight_brutto: Option<f64>,
}

/// Stock on a single warehouse as seen by the public site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStock {
    pub warehouse_id: i64,
    pub quantity: i64,
}

/// One size/variant option of a product, identified by `chrt_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub chrt_id: i64,
    pub tech_size: Option<String>,
    pub wb_size: Option<String>,
    #[serde(default)]
    pub skus: Vec<String>,
    /// Live price on the public site, roubles.
    pub site_price: Option<f64>,
    /// Seller's list price before the seller discount, roubles.
    pub supplier_price: Option<f64>,
    /// Seller's price after the seller discount, roubles.
    pub supplier_discounted_price: Option<f64>,
    /// Marketplace-funded discount on top of the seller price, percent 0–100.
    pub site_spp: Option<f64>,
    pub site_stocks: Option<Vec<SiteStock>>,
}

/// Canonical cached product, keyed by `nm_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    pub nm_id: i64,
    /// Legacy numeric seller id used by the public site.
    pub supplier_id: Option<i64>,
    pub brand: Option<String>,
    pub title: Option<String>,
    pub vendor_code: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub photos: Option<Photos>,
    #[serde(default)]
    pub sizes: Vec<Size>,
    /// Seller discount, percent.
    pub supplier_discount: Option<f64>,
    pub site_total_quantity: Option<i64>,
    pub first_size_site_price: Option<f64>,
    pub first_size_spp: Option<f64>,
    pub card_data_fetched_at: Option<DateTime<Utc>>,
    pub card_updated_at: Option<DateTime<Utc>>,
    pub price_data_fetched_at: Option<DateTime<Utc>>,
    pub site_data_fetched_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ProductDocument {
    /// An empty document as it exists right after its first sighting.
    #[must_use]
    pub fn new(nm_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            nm_id,
            supplier_id: None,
            brand: None,
            title: None,
            vendor_code: None,
            dimensions: None,
            photos: None,
            sizes: Vec::new(),
            supplier_discount: None,
            site_total_quantity: None,
            first_size_site_price: None,
            first_size_spp: None,
            card_data_fetched_at: None,
            card_updated_at: None,
            price_data_fetched_at: None,
            site_data_fetched_at: None,
            last_updated_at: now,
            created_at: now,
        }
    }

    #[must_use]
    pub fn size(&self, chrt_id: i64) -> Option<&Size> {
        self.sizes.iter().find(|s| s.chrt_id == chrt_id)
    }

    /// `true` when the enrichment stage still has something to discover.
    #[must_use]
    pub fn needs_enrichment(&self) -> bool {
        self.photos.is_none() || self.vendor_code.as_deref().is_none_or(str::is_empty)
    }
}

/// Position in the card list, as an `(updatedAt, nmId)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCursor {
    pub updated_at: DateTime<Utc>,
    pub nm_id: i64,
}

impl CardCursor {
    /// Cursor that resumes strictly after this position.
    ///
    /// The card API treats `updatedAt` as inclusive, so resuming from a
    /// stored document bumps it by one millisecond.
    #[must_use]
    pub fn one_past(&self) -> Self {
        Self {
            updated_at: self.updated_at + chrono::Duration::milliseconds(1),
            nm_id: self.nm_id,
        }
    }
}
