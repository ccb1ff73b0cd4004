//! Sliding-window throttle for the authenticated seller APIs.
//!
//! Windows are keyed by `(api key, category)`. The check-and-reserve
//! step happens under one mutex, so two callers can never both take the last
//! slot of a window. A background sweep drops timestamps older than
//! [`SWEEP_HORIZON`] and exits once the map is empty.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Timestamps older than this are evicted by the sweep.
pub const SWEEP_HORIZON: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    /// Content, ping and every other seller endpoint.
    Default,
    /// The discounts-prices API, which has its own quota.
    Prices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub default_per_window: usize,
    pub prices_per_window: usize,
    pub window: Duration,
}

impl RateLimits {
    #[must_use]
    pub fn limit_for(&self, category: RateCategory) -> usize {
        match category {
            RateCategory::Default => self.default_per_window,
            RateCategory::Prices => self.prices_per_window,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            default_per_window: 10,
            prices_per_window: 10,
            window: Duration::from_secs(6),
        }
    }
}

type WindowKey = (String, RateCategory);

struct Inner {
    limits: RateLimits,
    windows: Mutex<HashMap<WindowKey, VecDeque<Instant>>>,
    sweeper_running: AtomicBool,
}

/// Process-local limiter shared by every client built from one `WbHttp`.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.inner.limits)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            inner: Arc::new(Inner {
                limits,
                windows: Mutex::new(HashMap::new()),
                sweeper_running: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn limits(&self) -> RateLimits {
        self.inner.limits
    }

    /// Returns once a request for `api_key` in `category` may be issued.
    pub async fn wait_for_slot(&self, api_key: &str, category: RateCategory) {
        // Seller keys are JWTs sharing one header, so only the whole key is distinct.
        let key: WindowKey = (api_key.to_owned(), category);
        let limit = self.inner.limits.limit_for(category);
        let window = self.inner.limits.window;

        loop {
            let wait = {
                let mut windows = self.inner.windows.lock().await;
                let stamps = windows.entry(key.clone()).or_default();
                let now = Instant::now();
                while stamps.front().is_some_and(|t| now.duration_since(*t) >= window) {
                    stamps.pop_front();
                }
                if stamps.len() < limit {
                    stamps.push_back(now);
                    None
                } else {
                    stamps
                        .front()
                        .map(|oldest| (*oldest + window).saturating_duration_since(now))
                }
            };

            match wait {
                None => {
                    self.ensure_sweeper();
                    return;
                }
                Some(delay) => {
                    tracing::debug!(
                        ?category,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "rate limit window full, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.inner.windows.lock().await.len()
    }

    fn ensure_sweeper(&self) {
        if self
            .inner
            .sweeper_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(sweep(Arc::downgrade(&self.inner)));
        }
    }
}

async fn sweep(inner: Weak<Inner>) {
    loop {
        tokio::time::sleep(SWEEP_HORIZON).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut windows = inner.windows.lock().await;
        let now = Instant::now();
        for stamps in windows.values_mut() {
            stamps.retain(|t| now.duration_since(*t) < SWEEP_HORIZON);
        }
        windows.retain(|_, stamps| !stamps.is_empty());
        if windows.is_empty() {
            inner.sweeper_running.store(false, Ordering::Release);
            tracing::debug!("rate limiter idle, sweep stopped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fifteen_calls_never_exceed_ten_per_window() {
        let limiter = RateLimiter::new(RateLimits::default());
        let window = limiter.limits().window;
        let mut issued = Vec::new();
        for _ in 0..15 {
            limiter.wait_for_slot("key-a", RateCategory::Default).await;
            issued.push(Instant::now());
        }

        let start = issued[0];
        assert!(
            issued.iter().any(|t| t.duration_since(start) >= window),
            "at least one call must have been delayed"
        );
        for pair in issued.windows(11) {
            assert!(
                pair[10].duration_since(pair[0]) >= window,
                "11 calls landed inside one window"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn categories_and_keys_have_separate_windows() {
        let limiter = RateLimiter::new(RateLimits {
            default_per_window: 1,
            prices_per_window: 1,
            window: Duration::from_secs(6),
        });
        let start = Instant::now();
        limiter.wait_for_slot("key-a", RateCategory::Default).await;
        limiter.wait_for_slot("key-a", RateCategory::Prices).await;
        limiter.wait_for_slot("key-b", RateCategory::Default).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.tracked_keys().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn jwt_keys_with_a_shared_header_get_their_own_windows() {
        let limiter = RateLimiter::new(RateLimits {
            default_per_window: 1,
            prices_per_window: 1,
            window: Duration::from_secs(6),
        });
        let header = "eyJhbGciOiJFUzI1NiIsImtpZCI6IjIwMjQxMDE2djEiLCJ0eXAiOiJKV1QifQ";
        let first = format!("{header}.eyJvaWQiOjEyMzQ1LCJzIjoxMH0.c2lnbmF0dXJlLWE");
        let second = format!("{header}.eyJvaWQiOjY3ODkwLCJzIjoxMH0.c2lnbmF0dXJlLWI");

        let start = Instant::now();
        limiter.wait_for_slot(&first, RateCategory::Default).await;
        limiter.wait_for_slot(&second, RateCategory::Default).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.tracked_keys().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_window() {
        let limiter = RateLimiter::new(RateLimits {
            default_per_window: 2,
            prices_per_window: 2,
            window: Duration::from_secs(6),
        });
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.wait_for_slot("shared", RateCategory::Prices).await;
                    Instant::now()
                })
            })
            .collect();
        let mut delayed = 0;
        for handle in handles {
            if handle.await.unwrap().duration_since(start) >= Duration::from_secs(6) {
                delayed += 1;
            }
        }
        assert_eq!(delayed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_idle_keys() {
        let limiter = RateLimiter::new(RateLimits::default());
        limiter.wait_for_slot("key-a", RateCategory::Default).await;
        assert_eq!(limiter.tracked_keys().await, 1);
        tokio::time::sleep(SWEEP_HORIZON * 2 + Duration::from_secs(1)).await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
