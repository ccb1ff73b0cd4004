//! Price-history ledger entries and change detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::ProductDocument;

/// Why a history entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryTrigger {
    /// First observation for this product.
    Initial,
    ApiPrice,
    ApiDiscount,
    SitePrice,
    Spp,
}

impl HistoryTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryTrigger::Initial => "initial",
            HistoryTrigger::ApiPrice => "api_price",
            HistoryTrigger::ApiDiscount => "api_discount",
            HistoryTrigger::SitePrice => "site_price",
            HistoryTrigger::Spp => "spp",
        }
    }
}

impl std::fmt::Display for HistoryTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HistoryTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(HistoryTrigger::Initial),
            "api_price" => Ok(HistoryTrigger::ApiPrice),
            "api_discount" => Ok(HistoryTrigger::ApiDiscount),
            "site_price" => Ok(HistoryTrigger::SitePrice),
            "spp" => Ok(HistoryTrigger::Spp),
            other => Err(format!("unknown history trigger: {other}")),
        }
    }
}

/// Immutable price snapshot for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub nm_id: i64,
    pub created_at: DateTime<Utc>,
    pub api_price: Option<f64>,
    pub api_discount: Option<f64>,
    pub site_price: Option<f64>,
    pub spp: Option<f64>,
    pub trigger: HistoryTrigger,
}

/// The price fields tracked by the ledger, taken from a document's first size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub api_price: Option<f64>,
    pub api_discount: Option<f64>,
    pub site_price: Option<f64>,
    pub spp: Option<f64>,
}

impl PricePoint {
    #[must_use]
    pub fn of(doc: &ProductDocument) -> Self {
        let first = doc.sizes.first();
        Self {
            api_price: first.and_then(|s| s.supplier_price),
            api_discount: doc.supplier_discount,
            site_price: first.and_then(|s| s.site_price),
            spp: first.and_then(|s| s.site_spp),
        }
    }

    fn is_empty(&self) -> bool {
        self.api_price.is_none() && self.site_price.is_none()
    }

    fn from_entry(entry: &PriceHistoryEntry) -> Self {
        Self {
            api_price: entry.api_price,
            api_discount: entry.api_discount,
            site_price: entry.site_price,
            spp: entry.spp,
        }
    }
}

fn differs(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() > f64::EPSILON,
        (None, None) => false,
        _ => true,
    }
}

/// Classifies the change between the latest ledger entry and `current`.
///
/// Returns `None` when nothing tracked changed, or when there is no price at
/// all to record yet.
#[must_use]
pub fn detect_change(
    latest: Option<&PriceHistoryEntry>,
    current: &PricePoint,
) -> Option<HistoryTrigger> {
    if current.is_empty() {
        return None;
    }
    let Some(latest) = latest else {
        return Some(HistoryTrigger::Initial);
    };
    let last = PricePoint::from_entry(latest);
    if differs(last.api_price, current.api_price) {
        Some(HistoryTrigger::ApiPrice)
    } else if differs(last.api_discount, current.api_discount) {
        Some(HistoryTrigger::ApiDiscount)
    } else if differs(last.site_price, current.site_price) {
        Some(HistoryTrigger::SitePrice)
    } else if differs(last.spp, current.spp) {
        Some(HistoryTrigger::Spp)
    } else {
        None
    }
}

/// Builds the ledger entry for `doc` if its prices changed since `latest`.
#[must_use]
pub fn history_entry_for(
    doc: &ProductDocument,
    latest: Option<&PriceHistoryEntry>,
    now: DateTime<Utc>,
) -> Option<PriceHistoryEntry> {
    let point = PricePoint::of(doc);
    let trigger = detect_change(latest, &point)?;
    Some(PriceHistoryEntry {
        nm_id: doc.nm_id,
        created_at: now,
        api_price: point.api_price,
        api_discount: point.api_discount,
        site_price: point.site_price,
        spp: point.spp,
        trigger,
    })
}
