//! Retry policy for marketplace requests.
//!
//! HTTP 429 waits for the server's `Retry-After` (6 s when absent). Network
//! failures and 5xx back off linearly with jitter. Everything else, including
//! 401/403 and body parse failures, is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::WbError;
use crate::trace::{RequestRecord, RequestTrace};

/// Wait applied to a 429 that carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 6;

const MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Linear back-off step: the n-th retry waits `backoff_base_ms * n`.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

/// Returns `true` for errors that are worth retrying.
pub(crate) fn is_retriable(err: &WbError) -> bool {
    match err {
        WbError::RateLimited { .. } => true,
        WbError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        WbError::UnexpectedStatus { status, .. } => *status >= 500,
        WbError::Deserialize { .. }
        | WbError::Unauthorized { .. }
        | WbError::InvalidToken(_)
        | WbError::NoData(_)
        | WbError::InvalidBaseUrl { .. } => false,
    }
}

/// Delay before retry number `attempt` (1-based).
pub(crate) fn delay_for(err: &WbError, attempt: u32, policy: RetryPolicy) -> Duration {
    if let WbError::RateLimited {
        retry_after_secs, ..
    } = err
    {
        return Duration::from_secs(*retry_after_secs);
    }
    let linear = policy
        .backoff_base_ms
        .saturating_mul(u64::from(attempt))
        .min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (linear as f64 * (rand::random::<f64>() * 0.4 + 0.8)) as u64;
    Duration::from_millis(jittered)
}

/// Runs `operation` until it succeeds, fails permanently, or retries run out.
///
/// Each attempt yields its result together with the [`RequestRecord`] that
/// describes it; every record lands in `trace`, including failed ones.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    trace: &mut RequestTrace,
    mut operation: F,
) -> Result<T, WbError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = (Result<T, WbError>, RequestRecord)>,
{
    let mut attempt = 0u32;
    loop {
        let (result, record) = operation(attempt).await;
        trace.push(record);
        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = delay_for(&err, attempt, policy);
                tracing::warn!(
                    operation = %trace.operation,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient WB error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
