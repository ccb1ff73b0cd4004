//! Offline inspection of seller API keys.
//!
//! Seller keys are JWTs. The payload carries a scope bitmask (`s`), an expiry
//! (`exp`, unix seconds) and a sandbox flag (`t`). The signature is not
//! checked; this only tells an operator what a key is allowed to do.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WbError;

const CONTENT_BIT: u32 = 1;
const PRICES_BIT: u32 = 3;
const READ_ONLY_BIT: u32 = 30;

/// Scope bits and the category names they grant.
const CATEGORY_BITS: &[(u32, &str)] = &[
    (1, "content"),
    (2, "analytics"),
    (3, "prices"),
    (4, "marketplace"),
    (5, "statistics"),
    (6, "promotion"),
    (7, "feedback"),
    (9, "chat"),
    (10, "supplies"),
    (11, "returns"),
    (12, "documents"),
    (13, "finance"),
];

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    s: u64,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    t: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub has_content_access: bool,
    pub has_price_access: bool,
    pub is_read_only: bool,
    pub is_sandbox: bool,
    pub access_categories: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenInfo {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

fn has_bit(mask: u64, bit: u32) -> bool {
    mask & (1u64 << bit) != 0
}

/// Decodes the JWT payload of `api_key` without any network call.
///
/// # Errors
///
/// Returns [`WbError::InvalidToken`] if the key is not a three-part JWT or its
/// payload is not base64url JSON.
pub fn decode_token(api_key: &str) -> Result<TokenInfo, WbError> {
    let mut parts = api_key.trim().split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(WbError::InvalidToken(
            "expected three dot-separated segments".to_owned(),
        ));
    };

    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| WbError::InvalidToken(format!("payload is not base64url: {e}")))?;
    let payload: TokenPayload = serde_json::from_slice(&raw)
        .map_err(|e| WbError::InvalidToken(format!("payload is not JSON: {e}")))?;

    let access_categories = CATEGORY_BITS
        .iter()
        .filter(|(bit, _)| has_bit(payload.s, *bit))
        .map(|(_, name)| (*name).to_owned())
        .collect();

    Ok(TokenInfo {
        has_content_access: has_bit(payload.s, CONTENT_BIT),
        has_price_access: has_bit(payload.s, PRICES_BIT),
        is_read_only: has_bit(payload.s, READ_ONLY_BIT),
        is_sandbox: payload.t,
        access_categories,
        expires_at: payload
            .exp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","kid":"test"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn content_and_price_scopes_are_detected() {
        let mask = (1u64 << 1) | (1u64 << 3) | (1u64 << 5);
        let token = token_with(&serde_json::json!({ "s": mask, "exp": 1_900_000_000 }));
        let info = decode_token(&token).unwrap();
        assert!(info.has_content_access);
        assert!(info.has_price_access);
        assert!(!info.is_read_only);
        assert!(!info.is_sandbox);
        assert_eq!(
            info.access_categories,
            vec!["content", "prices", "statistics"]
        );
        assert_eq!(
            info.expires_at,
            DateTime::<Utc>::from_timestamp(1_900_000_000, 0)
        );
    }

    #[test]
    fn read_only_and_sandbox_flags() {
        let mask = (1u64 << 1) | (1u64 << 30);
        let token = token_with(&serde_json::json!({ "s": mask, "t": true }));
        let info = decode_token(&token).unwrap();
        assert!(info.is_read_only);
        assert!(info.is_sandbox);
        assert!(!info.has_price_access);
        assert_eq!(info.expires_at, None);
    }

    #[test]
    fn expiry_is_compared_against_now() {
        let token = token_with(&serde_json::json!({ "s": 2, "exp": 1_000 }));
        let info = decode_token(&token).unwrap();
        assert!(info.is_expired(Utc::now()));
    }

    #[test]
    fn non_jwt_key_is_rejected() {
        assert!(matches!(
            decode_token("plain-api-key"),
            Err(WbError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(matches!(
            decode_token("aGVhZGVy.!!!.c2ln"),
            Err(WbError::InvalidToken(_))
        ));
    }
}
