//! Speculative photo and vendor-code discovery on the WB CDN.
//!
//! A product's static assets live under `vol{n/100000}/part{n/1000}/{n}` on
//! one of the `basket-NN` shards, and nothing says which. Every shard is
//! probed at once; the first hit wins and the remaining in-flight probes are
//! dropped.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use wbcache_core::Photos;

use crate::error::WbError;
use crate::types::CdnCardInfo;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_SHARD_COUNT: u32 = 20;

const THUMBNAIL_PATH: &str = "images/c246x328/1.webp";
const MEDIUM_PATH: &str = "images/c516x688/1.webp";
const CARD_JSON_PATH: &str = "info/ru/card.json";

/// `https://basket-01.wbbasket.ru` … `https://basket-NN.wbbasket.ru`.
#[must_use]
pub fn default_shard_hosts(count: u32) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://basket-{i:02}.wbbasket.ru"))
        .collect()
}

/// Path of a product's asset folder relative to a shard host.
#[must_use]
pub fn basket_path(nm_id: i64) -> String {
    let vol = nm_id / 100_000;
    let part = nm_id / 1_000;
    format!("vol{vol}/part{part}/{nm_id}")
}

#[derive(Debug, Clone)]
pub struct ImageProber {
    client: Client,
    hosts: Vec<String>,
    timeout: Duration,
}

impl ImageProber {
    /// # Errors
    ///
    /// Returns [`WbError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn new(timeout: Duration, shard_count: u32, user_agent: &str) -> Result<Self, WbError> {
        Self::with_hosts(timeout, default_shard_hosts(shard_count), user_agent)
    }

    /// Probes an explicit host list (mock servers in tests).
    ///
    /// # Errors
    ///
    /// Returns [`WbError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn with_hosts(
        timeout: Duration,
        hosts: Vec<String>,
        user_agent: &str,
    ) -> Result<Self, WbError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        let hosts = hosts
            .into_iter()
            .map(|h| h.trim_end_matches('/').to_owned())
            .collect();
        Ok(Self {
            client,
            hosts,
            timeout,
        })
    }

    fn candidates(&self, nm_id: i64, asset: &str) -> Vec<String> {
        let path = basket_path(nm_id);
        self.hosts
            .iter()
            .map(|host| format!("{host}/{path}/{asset}"))
            .collect()
    }

    /// Finds both photo sizes; returns `None` unless both resolve.
    pub async fn find_photos(&self, nm_id: i64) -> Option<Photos> {
        let (thumbnail, medium) = tokio::join!(
            self.first_head_hit(self.candidates(nm_id, THUMBNAIL_PATH)),
            self.first_head_hit(self.candidates(nm_id, MEDIUM_PATH)),
        );
        match (thumbnail, medium) {
            (Some(thumbnail), Some(medium)) => Some(Photos { thumbnail, medium }),
            (thumbnail, medium) => {
                tracing::debug!(
                    nm_id,
                    thumbnail = thumbnail.is_some(),
                    medium = medium.is_some(),
                    "photo probe incomplete, discarding"
                );
                None
            }
        }
    }

    /// Reads `vendor_code` from the first shard that serves the card JSON.
    pub async fn find_vendor_code(&self, nm_id: i64) -> Option<String> {
        let client = &self.client;
        let timeout = self.timeout;
        let mut probes = stream::iter(self.candidates(nm_id, CARD_JSON_PATH))
            .map(|url| async move {
                let response = tokio::time::timeout(timeout, client.get(&url).send())
                    .await
                    .ok()?
                    .ok()?;
                if response.status() != StatusCode::OK {
                    return None;
                }
                let info: CdnCardInfo = response.json().await.ok()?;
                info.vendor_code.filter(|v| !v.is_empty())
            })
            .buffer_unordered(self.hosts.len().max(1));

        while let Some(found) = probes.next().await {
            if found.is_some() {
                return found;
            }
        }
        tracing::debug!(nm_id, "vendor code not found on any shard");
        None
    }

    async fn first_head_hit(&self, urls: Vec<String>) -> Option<String> {
        let client = &self.client;
        let timeout = self.timeout;
        let mut probes = stream::iter(urls)
            .map(|url| async move {
                match tokio::time::timeout(timeout, client.head(&url).send()).await {
                    Ok(Ok(response)) if response.status() == StatusCode::OK => Some(url),
                    _ => None,
                }
            })
            .buffer_unordered(self.hosts.len().max(1));

        while let Some(hit) = probes.next().await {
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}
