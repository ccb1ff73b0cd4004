//! Card list pagination.

use chrono::SecondsFormat;
use wbcache_core::{CardCursor, CardPatch, CardSize, Dimensions, Photos};

use crate::error::WbError;
use crate::http::WbRequest;
use crate::trace::RequestTrace;
use crate::types::{
    CardsFilter, CardsListRequest, CardsListResponse, CardsSettings, CardsSort, CursorRequest,
    WbCard,
};

use super::SellerClient;

/// Largest page the card API serves.
pub const CARD_PAGE_SIZE: usize = 100;

/// Page ceiling per call; protects against a cursor that never advances.
pub const MAX_CARD_PAGES: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ProductsQuery {
    pub text_search: Option<String>,
    /// Maximum number of cards to collect in this call.
    pub limit: usize,
    pub cursor: Option<CardCursor>,
    pub ascending: bool,
}

impl ProductsQuery {
    /// Everything after `cursor`, oldest first.
    #[must_use]
    pub fn after(cursor: Option<CardCursor>, limit: usize) -> Self {
        Self {
            text_search: None,
            limit,
            cursor,
            ascending: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CardListOutcome {
    pub cards: Vec<WbCard>,
    /// Cursor to pass back to continue after the last card returned.
    pub next_cursor: Option<CardCursor>,
    pub total_available: Option<u64>,
    /// `true` when the API returned a short page: nothing is left.
    pub exhausted: bool,
    pub trace: RequestTrace,
}

fn request_body(query: &ProductsQuery, cursor: Option<&CardCursor>, page_size: usize) -> CardsListRequest {
    CardsListRequest {
        settings: CardsSettings {
            cursor: CursorRequest {
                limit: page_size,
                updated_at: cursor
                    .map(|c| c.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
                nm_id: cursor.map(|c| c.nm_id),
            },
            filter: CardsFilter {
                with_photo: -1,
                text_search: query.text_search.clone(),
            },
            sort: CardsSort {
                ascending: query.ascending,
            },
        },
    }
}

/// Maps a card to the stage-1 patch: descriptive fields and size identity,
/// no prices.
#[must_use]
pub fn card_patch(card: &WbCard, legacy_supplier_id: i64) -> CardPatch {
    let photos = card.photos.first().and_then(|p| {
        match (p.c246x328.as_ref(), p.c516x688.as_ref().or(p.big.as_ref())) {
            (Some(thumbnail), Some(medium)) => Some(Photos {
                thumbnail: thumbnail.clone(),
                medium: medium.clone(),
            }),
            _ => None,
        }
    });

    CardPatch {
        supplier_id: legacy_supplier_id,
        brand: card.brand.clone().filter(|b| !b.is_empty()),
        title: card.title.clone().filter(|t| !t.is_empty()),
        vendor_code: card.vendor_code.clone().filter(|v| !v.is_empty()),
        dimensions: card.dimensions.as_ref().map(|d| Dimensions {
            length: d.length,
            width: d.width,
            height: d.height,
            weight_brutto: d.weight_brutto,
        }),
        photos,
        sizes: card
            .sizes
            .iter()
            .map(|s| CardSize {
                chrt_id: s.chrt_id,
                tech_size: s.tech_size.clone(),
                wb_size: s.wb_size.clone(),
                skus: s.skus.clone(),
            })
            .collect(),
        card_updated_at: card.updated_at,
    }
}

impl SellerClient {
    /// Pages through the card list until `query.limit` cards are collected or
    /// the API runs dry.
    ///
    /// # Errors
    ///
    /// Propagates the first request error; cards from earlier pages of this
    /// call are discarded.
    pub async fn get_products_list(
        &self,
        query: &ProductsQuery,
    ) -> Result<CardListOutcome, WbError> {
        let mut trace = RequestTrace::new("cards list");
        let url = format!("{}/content/v2/get/cards/list", self.http.endpoints().content);
        let mut cursor = query.cursor.clone();
        let mut cards: Vec<WbCard> = Vec::new();
        let mut total_available = None;
        let mut exhausted = false;
        let mut pages = 0usize;

        while cards.len() < query.limit {
            pages += 1;
            if pages > MAX_CARD_PAGES {
                tracing::warn!(
                    max_pages = MAX_CARD_PAGES,
                    collected = cards.len(),
                    "card pagination ceiling reached, stopping"
                );
                break;
            }

            let page_size = CARD_PAGE_SIZE.min(query.limit - cards.len());
            let body = serde_json::to_value(request_body(query, cursor.as_ref(), page_size))
                .map_err(|e| WbError::Deserialize {
                    context: "cards list request body".to_owned(),
                    source: e,
                })?;
            let request = WbRequest::post(url.clone(), body, format!("cards page {pages}"))
                .authorized(&self.api_key);
            let page: CardsListResponse = self.http.execute(&request, &mut trace).await?;

            let received = page.cards.len();
            if let Some(c) = page.cursor {
                total_available = c.total.or(total_available);
                if let (Some(updated_at), Some(nm_id)) = (c.updated_at, c.nm_id) {
                    cursor = Some(CardCursor { updated_at, nm_id });
                }
            }
            cards.extend(page.cards);

            if received < page_size {
                exhausted = true;
                break;
            }
        }

        Ok(CardListOutcome {
            cards,
            next_cursor: cursor,
            total_available,
            exhausted,
            trace,
        })
    }
}
