//! Authenticated client for one seller API key.
//!
//! Every request goes through the shared rate limiter, is retried per the
//! [`RetryPolicy`](crate::retry::RetryPolicy), and is recorded in the
//! operation's [`RequestTrace`].

mod cards;
mod legacy;
mod prices;

use chrono::Utc;
use serde::Serialize;

use crate::error::WbError;
use crate::http::{WbHttp, WbRequest};
use crate::token::{decode_token, TokenInfo};
use crate::trace::RequestTrace;

pub use cards::{card_patch, CardListOutcome, ProductsQuery, CARD_PAGE_SIZE, MAX_CARD_PAGES};
pub use legacy::LegacySupplierInfo;
pub use prices::{plan_price_batches, PriceListOutcome, PRICE_FAN_OUT, PRICE_PAGE_MAX};

/// Result of [`SellerClient::validate_api_key`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValidation {
    pub valid: bool,
    /// Why the key is not usable; empty when `valid`.
    pub reasons: Vec<String>,
    pub token: Option<TokenInfo>,
    #[serde(skip)]
    pub trace: RequestTrace,
}

#[derive(Clone)]
pub struct SellerClient {
    http: WbHttp,
    api_key: String,
}

impl std::fmt::Debug for SellerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SellerClient")
            .field("http", &self.http)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

impl SellerClient {
    #[must_use]
    pub fn new(http: WbHttp, api_key: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_owned(),
        }
    }

    /// Decodes the key's scopes and expiry without a network call.
    ///
    /// # Errors
    ///
    /// Returns [`WbError::InvalidToken`] if the key is not a JWT.
    pub fn decode_token(&self) -> Result<TokenInfo, WbError> {
        decode_token(&self.api_key)
    }

    /// Live round trip against the content API ping endpoint.
    ///
    /// # Errors
    ///
    /// Any request error, including [`WbError::Unauthorized`] for a revoked key.
    pub async fn check_connection(&self) -> Result<RequestTrace, WbError> {
        let mut trace = RequestTrace::new("ping");
        self.ping(&mut trace).await?;
        Ok(trace)
    }

    async fn ping(&self, trace: &mut RequestTrace) -> Result<(), WbError> {
        let url = format!("{}/ping", self.http.endpoints().content);
        let request = WbRequest::get(url, "ping".to_owned()).authorized(&self.api_key);
        let _: serde_json::Value = self.http.execute(&request, trace).await?;
        Ok(())
    }

    /// A key is usable when it grants content and price access, is not
    /// read-only or expired, and the ping succeeds.
    pub async fn validate_api_key(&self) -> KeyValidation {
        let mut trace = RequestTrace::new("validate key");
        let mut reasons = Vec::new();

        let token = match self.decode_token() {
            Ok(info) => {
                if !info.has_content_access {
                    reasons.push("key lacks content access".to_owned());
                }
                if !info.has_price_access {
                    reasons.push("key lacks prices access".to_owned());
                }
                if info.is_read_only {
                    reasons.push("key is read-only".to_owned());
                }
                if info.is_expired(Utc::now()) {
                    reasons.push("key has expired".to_owned());
                }
                Some(info)
            }
            Err(e) => {
                reasons.push(e.to_string());
                None
            }
        };

        if let Err(e) = self.ping(&mut trace).await {
            reasons.push(format!("ping failed: {e}"));
        }

        KeyValidation {
            valid: reasons.is_empty(),
            reasons,
            token,
            trace,
        }
    }
}

#[cfg(test)]
#[path = "../seller_test.rs"]
mod tests;
