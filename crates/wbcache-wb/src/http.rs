//! Shared HTTP plumbing: one `reqwest` client, the endpoint set, the rate
//! limiter and the retry policy. Cheap to clone; clones share the limiter.

use std::time::{Duration, Instant};

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use wbcache_core::AppConfig;

use crate::error::WbError;
use crate::rate_limit::{RateCategory, RateLimiter, RateLimits};
use crate::retry::{retry_with_backoff, RetryPolicy, DEFAULT_RETRY_AFTER_SECS};
use crate::trace::{RequestRecord, RequestTrace};

/// Base URLs of the three WB hosts the worker talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbEndpoints {
    pub content: String,
    pub prices: String,
    pub public: String,
}

impl WbEndpoints {
    /// Points every endpoint at one base URL (a mock server in tests).
    #[must_use]
    pub fn single(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_owned();
        Self {
            content: base.clone(),
            prices: base.clone(),
            public: base,
        }
    }

    fn validate(&self) -> Result<(), WbError> {
        for url in [&self.content, &self.prices, &self.public] {
            reqwest::Url::parse(url).map_err(|e| WbError::InvalidBaseUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WbSettings {
    pub endpoints: WbEndpoints,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub limits: RateLimits,
}

impl WbSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoints: WbEndpoints {
                content: config.wb_content_url.clone(),
                prices: config.wb_prices_url.clone(),
                public: config.wb_public_url.clone(),
            },
            request_timeout: Duration::from_secs(config.wb_request_timeout_secs),
            user_agent: config.wb_user_agent.clone(),
            retry: RetryPolicy {
                max_retries: config.wb_max_retries,
                backoff_base_ms: config.wb_retry_backoff_ms,
            },
            limits: RateLimits {
                default_per_window: config.rate_limit_default,
                prices_per_window: config.rate_limit_prices,
                window: Duration::from_secs(config.rate_limit_window_secs),
            },
        }
    }

    /// Settings for a mock server: one base URL, no retries, default limits.
    #[must_use]
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            endpoints: WbEndpoints::single(base_url),
            request_timeout: Duration::from_secs(5),
            user_agent: "wbcache-test/0.1".to_owned(),
            retry: RetryPolicy::none(),
            limits: RateLimits::default(),
        }
    }
}

/// One logical request; re-issued verbatim on retry.
#[derive(Debug, Clone)]
pub(crate) struct WbRequest<'a> {
    pub method: Method,
    pub url: String,
    pub api_key: Option<&'a str>,
    pub body: Option<serde_json::Value>,
    pub context: String,
}

impl<'a> WbRequest<'a> {
    pub(crate) fn get(url: String, context: String) -> Self {
        Self {
            method: Method::GET,
            url,
            api_key: None,
            body: None,
            context,
        }
    }

    pub(crate) fn post(url: String, body: serde_json::Value, context: String) -> Self {
        Self {
            method: Method::POST,
            url,
            api_key: None,
            body: Some(body),
            context,
        }
    }

    /// Sends `Authorization: <key>` and routes the request through the limiter.
    pub(crate) fn authorized(mut self, api_key: &'a str) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

#[derive(Clone)]
pub struct WbHttp {
    client: Client,
    endpoints: WbEndpoints,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl std::fmt::Debug for WbHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WbHttp")
            .field("endpoints", &self.endpoints)
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl WbHttp {
    /// # Errors
    ///
    /// Returns [`WbError::InvalidBaseUrl`] for an unparsable endpoint and
    /// [`WbError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn new(settings: &WbSettings) -> Result<Self, WbError> {
        settings.endpoints.validate()?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoints: settings.endpoints.clone(),
            limiter: RateLimiter::new(settings.limits),
            retry: settings.retry,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &WbEndpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub(crate) fn category_for(&self, url: &str) -> RateCategory {
        if url.starts_with(&self.endpoints.prices) {
            RateCategory::Prices
        } else {
            RateCategory::Default
        }
    }

    /// Sends `request` with retries, recording every attempt into `trace`.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        request: &WbRequest<'_>,
        trace: &mut RequestTrace,
    ) -> Result<T, WbError> {
        retry_with_backoff(self.retry, trace, |attempt| {
            self.attempt::<T>(request, attempt)
        })
        .await
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &WbRequest<'_>,
        attempt: u32,
    ) -> (Result<T, WbError>, RequestRecord) {
        if let Some(key) = request.api_key {
            self.limiter
                .wait_for_slot(key, self.category_for(&request.url))
                .await;
        }

        let started = Instant::now();
        let record = RequestRecord::new(request.method.as_str(), &request.url, attempt);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = request.api_key {
            builder = builder.header(reqwest::header::AUTHORIZATION, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = WbError::Http(e);
                let record = record.with_error(&err).elapsed(started.elapsed());
                return (Err(err), record);
            }
        };

        let status = response.status();
        let retry_after_secs = retry_after(&response);
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let err = WbError::Http(e);
                let record = record
                    .with_status(status.as_u16())
                    .with_error(&err)
                    .elapsed(started.elapsed());
                return (Err(err), record);
            }
        };

        let record = record
            .with_status(status.as_u16())
            .with_body(&body)
            .elapsed(started.elapsed());
        let result = interpret(status, &request.url, retry_after_secs, &body, &request.context);
        let record = match &result {
            Ok(_) => record,
            Err(e) => record.with_error(e),
        };
        (result, record)
    }
}

/// WB sends either the standard header or its own `X-Ratelimit-Retry`.
fn retry_after(response: &reqwest::Response) -> Option<u64> {
    ["retry-after", "x-ratelimit-retry"].iter().find_map(|name| {
        response
            .headers()
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
    })
}

fn interpret<T: DeserializeOwned>(
    status: StatusCode,
    url: &str,
    retry_after_secs: Option<u64>,
    body: &str,
    context: &str,
) -> Result<T, WbError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(WbError::RateLimited {
            url: url.to_owned(),
            retry_after_secs: retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(WbError::Unauthorized {
            url: url.to_owned(),
        });
    }
    if !status.is_success() {
        return Err(WbError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }
    serde_json::from_str::<T>(body).map_err(|e| WbError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_host_maps_to_prices_category() {
        let settings = WbSettings {
            endpoints: WbEndpoints {
                content: "https://content-api.wildberries.ru".to_owned(),
                prices: "https://discounts-prices-api.wildberries.ru".to_owned(),
                public: "https://card.wb.ru".to_owned(),
            },
            ..WbSettings::for_base_url("http://unused")
        };
        let http = WbHttp::new(&settings).unwrap();
        assert_eq!(
            http.category_for("https://discounts-prices-api.wildberries.ru/api/v2/list/goods/filter"),
            RateCategory::Prices
        );
        assert_eq!(
            http.category_for("https://content-api.wildberries.ru/content/v2/get/cards/list"),
            RateCategory::Default
        );
    }

    #[test]
    fn unparsable_endpoint_is_rejected() {
        let settings = WbSettings::for_base_url("not a url");
        assert!(matches!(
            WbHttp::new(&settings),
            Err(WbError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn rate_limited_without_header_defaults_to_six_seconds() {
        let result = interpret::<serde_json::Value>(
            StatusCode::TOO_MANY_REQUESTS,
            "https://wb.test",
            None,
            "",
            "test",
        );
        assert!(matches!(
            result,
            Err(WbError::RateLimited {
                retry_after_secs: 6,
                ..
            })
        ));
    }

    #[test]
    fn forbidden_maps_to_unauthorized() {
        let result =
            interpret::<serde_json::Value>(StatusCode::FORBIDDEN, "https://wb.test", None, "", "t");
        assert!(matches!(result, Err(WbError::Unauthorized { .. })));
    }

    #[test]
    fn bad_body_maps_to_deserialize() {
        let result = interpret::<serde_json::Value>(
            StatusCode::OK,
            "https://wb.test",
            None,
            "<html>",
            "cards page",
        );
        assert!(matches!(
            result,
            Err(WbError::Deserialize { ref context, .. }) if context == "cards page"
        ));
    }
}
