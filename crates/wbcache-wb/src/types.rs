//! Wire types for the seller content/prices APIs and the public card API.
//!
//! Field names follow the upstream JSON; everything optional upstream is
//! `Option` or `#[serde(default)]` here so a sparse response still parses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Content API: POST /content/v2/get/cards/list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CardsListRequest {
    pub settings: CardsSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardsSettings {
    pub cursor: CursorRequest,
    pub filter: CardsFilter,
    pub sort: CardsSort,
}

#[derive(Debug, Clone, Serialize)]
pub struct CursorRequest {
    pub limit: usize,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "nmID", skip_serializing_if = "Option::is_none")]
    pub nm_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardsFilter {
    /// `-1` returns cards with and without photos.
    #[serde(rename = "withPhoto")]
    pub with_photo: i32,
    #[serde(rename = "textSearch", skip_serializing_if = "Option::is_none")]
    pub text_search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardsSort {
    pub ascending: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardsListResponse {
    #[serde(default)]
    pub cards: Vec<WbCard>,
    #[serde(default)]
    pub cursor: Option<CursorResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CursorResponse {
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "nmID", default)]
    pub nm_id: Option<i64>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WbCard {
    #[serde(rename = "nmID")]
    pub nm_id: i64,
    #[serde(rename = "vendorCode", default)]
    pub vendor_code: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub photos: Vec<WbPhoto>,
    #[serde(default)]
    pub dimensions: Option<WbDimensions>,
    #[serde(default)]
    pub sizes: Vec<WbCardSize>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WbPhoto {
    #[serde(default)]
    pub big: Option<String>,
    #[serde(default)]
    pub c246x328: Option<String>,
    #[serde(default)]
    pub c516x688: Option<String>,
    #[serde(default)]
    pub tm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WbDimensions {
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(rename = "weightBrutto", default)]
    pub weight_brutto: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WbCardSize {
    #[serde(rename = "chrtID")]
    pub chrt_id: i64,
    #[serde(rename = "techSize", default)]
    pub tech_size: Option<String>,
    #[serde(rename = "wbSize", default)]
    pub wb_size: Option<String>,
    #[serde(default)]
    pub skus: Vec<String>,
}

// ---------------------------------------------------------------------------
// Prices API: GET /api/v2/list/goods/filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GoodsListResponse {
    #[serde(default)]
    pub data: Option<GoodsListData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoodsListData {
    #[serde(rename = "listGoods", default)]
    pub list_goods: Vec<GoodsPrice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoodsPrice {
    #[serde(rename = "nmID")]
    pub nm_id: i64,
    #[serde(rename = "vendorCode", default)]
    pub vendor_code: Option<String>,
    #[serde(default)]
    pub sizes: Vec<GoodsSizePrice>,
    /// Seller discount, percent.
    #[serde(default)]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoodsSizePrice {
    /// Same identifier as the card's `chrtID`.
    #[serde(rename = "sizeID")]
    pub size_id: i64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "discountedPrice", default)]
    pub discounted_price: Option<f64>,
    #[serde(rename = "techSizeName", default)]
    pub tech_size_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Public card API: GET /cards/v2/detail?nm=1;2;3
// ---------------------------------------------------------------------------

/// The detail endpoint has answered both with and without a `data` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteDetailResponse {
    #[serde(default)]
    pub data: Option<SiteDetailData>,
    #[serde(default)]
    pub products: Option<Vec<SiteProductWire>>,
}

impl SiteDetailResponse {
    #[must_use]
    pub fn into_products(self) -> Vec<SiteProductWire> {
        self.data
            .map(|d| d.products)
            .or(self.products)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteDetailData {
    #[serde(default)]
    pub products: Vec<SiteProductWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteProductWire {
    pub id: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(rename = "supplierId", default)]
    pub supplier_id: Option<i64>,
    #[serde(default)]
    pub sizes: Vec<SiteSizeWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSizeWire {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "origName", default)]
    pub orig_name: Option<String>,
    #[serde(rename = "optionId", default)]
    pub option_id: Option<i64>,
    #[serde(default)]
    pub stocks: Vec<SiteStockWire>,
    #[serde(default)]
    pub price: Option<SitePriceWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteStockWire {
    pub wh: i64,
    #[serde(default)]
    pub qty: i64,
}

/// Prices in kopecks.
#[derive(Debug, Clone, Deserialize)]
pub struct SitePriceWire {
    #[serde(default)]
    pub basic: Option<f64>,
    #[serde(default)]
    pub product: Option<f64>,
}

// ---------------------------------------------------------------------------
// CDN: /vol{v}/part{p}/{nm}/info/ru/card.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CdnCardInfo {
    #[serde(default)]
    pub vendor_code: Option<String>,
}
