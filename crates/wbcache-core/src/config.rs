use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        match raw.parse::<usize>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Ok(v) => Ok(v),
            Err(e) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        }
    };

    let url = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(raw.trim_end_matches('/').to_string())
        } else {
            Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("\"{raw}\" is not an http(s) URL"),
            })
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("WBCACHE_ENV", "development"))?;
    let log_level = or_default("WBCACHE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("WBCACHE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("WBCACHE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_num("WBCACHE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let worker_interval_secs = parse_num("WBCACHE_WORKER_INTERVAL_SECS", "60")?;
    if worker_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WBCACHE_WORKER_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    let wb_content_url = url(
        "WBCACHE_WB_CONTENT_URL",
        "https://content-api.wildberries.ru",
    )?;
    let wb_prices_url = url(
        "WBCACHE_WB_PRICES_URL",
        "https://discounts-prices-api.wildberries.ru",
    )?;
    let wb_public_url = url("WBCACHE_WB_PUBLIC_URL", "https://card.wb.ru")?;
    let wb_request_timeout_secs = parse_num("WBCACHE_WB_REQUEST_TIMEOUT_SECS", "30")?;
    let wb_user_agent = or_default("WBCACHE_WB_USER_AGENT", "wbcache/0.1 (product-aggregator)");
    let wb_max_retries = parse_u32("WBCACHE_WB_MAX_RETRIES", "3")?;
    let wb_retry_backoff_ms = parse_num("WBCACHE_WB_RETRY_BACKOFF_MS", "1000")?;

    let rate_limit_default = parse_positive_usize("WBCACHE_RATE_LIMIT_DEFAULT", "10")?;
    let rate_limit_prices = parse_positive_usize("WBCACHE_RATE_LIMIT_PRICES", "10")?;
    let rate_limit_window_secs = parse_num("WBCACHE_RATE_LIMIT_WINDOW_SECS", "6")?;

    let site_url_budget = parse_positive_usize("WBCACHE_SITE_URL_BUDGET", "4096")?;
    let probe_timeout_secs = parse_num("WBCACHE_PROBE_TIMEOUT_SECS", "3")?;
    let probe_shards = parse_u32("WBCACHE_PROBE_SHARDS", "20")?;
    let enrichment_batch = parse_positive_usize("WBCACHE_ENRICHMENT_BATCH", "200")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        worker_interval_secs,
        wb_content_url,
        wb_prices_url,
        wb_public_url,
        wb_request_timeout_secs,
        wb_user_agent,
        wb_max_retries,
        wb_retry_backoff_ms,
        rate_limit_default,
        rate_limit_prices,
        rate_limit_window_secs,
        site_url_budget,
        probe_timeout_secs,
        probe_shards,
        enrichment_batch,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WBCACHE_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
