#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Seconds between pipeline ticks.
    pub worker_interval_secs: u64,
    pub wb_content_url: String,
    pub wb_prices_url: String,
    pub wb_public_url: String,
    pub wb_request_timeout_secs: u64,
    pub wb_user_agent: String,
    pub wb_max_retries: u32,
    pub wb_retry_backoff_ms: u64,
    pub rate_limit_default: usize,
    pub rate_limit_prices: usize,
    pub rate_limit_window_secs: u64,
    /// Maximum rendered URL length for public site batch requests.
    pub site_url_budget: usize,
    pub probe_timeout_secs: u64,
    pub probe_shards: u32,
    pub enrichment_batch: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("worker_interval_secs", &self.worker_interval_secs)
            .field("wb_content_url", &self.wb_content_url)
            .field("wb_prices_url", &self.wb_prices_url)
            .field("wb_public_url", &self.wb_public_url)
            .field("wb_request_timeout_secs", &self.wb_request_timeout_secs)
            .field("wb_user_agent", &self.wb_user_agent)
            .field("wb_max_retries", &self.wb_max_retries)
            .field("wb_retry_backoff_ms", &self.wb_retry_backoff_ms)
            .field("rate_limit_default", &self.rate_limit_default)
            .field("rate_limit_prices", &self.rate_limit_prices)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("site_url_budget", &self.site_url_budget)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("probe_shards", &self.probe_shards)
            .field("enrichment_batch", &self.enrichment_batch)
            .finish()
    }
}
