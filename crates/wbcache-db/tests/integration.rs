//! Offline unit tests for wbcache-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wbcache_core::{AppConfig, Environment, ProductDocument, StoreError};
use wbcache_db::{DbError, PipelineRunRow, PoolConfig, ProductRow, RunStatus};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        worker_interval_secs: 300,
        wb_content_url: "https://content-api.wildberries.ru".to_string(),
        wb_prices_url: "https://discounts-prices-api.wildberries.ru".to_string(),
        wb_public_url: "https://card.wb.ru".to_string(),
        wb_request_timeout_secs: 30,
        wb_user_agent: "ua".to_string(),
        wb_max_retries: 3,
        wb_retry_backoff_ms: 1000,
        rate_limit_default: 10,
        rate_limit_prices: 10,
        rate_limit_window_secs: 6,
        site_url_budget: 4096,
        probe_timeout_secs: 3,
        probe_shards: 20,
        enrichment_batch: 200,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn product_row_decodes_its_document() {
    let now = Utc::now();
    let doc = ProductDocument::new(42, now);
    let row = ProductRow {
        nm_id: 42,
        supplier_id: None,
        card_updated_at: None,
        needs_enrichment: true,
        document: serde_json::to_value(&doc).unwrap(),
        created_at: now,
        last_updated_at: now,
    };

    assert_eq!(row.into_document().unwrap(), doc);
}

#[test]
fn product_row_with_foreign_document_is_malformed() {
    let now = Utc::now();
    let row = ProductRow {
        nm_id: 42,
        supplier_id: None,
        card_updated_at: None,
        needs_enrichment: true,
        document: json!({"unexpected": true}),
        created_at: now,
        last_updated_at: now,
    };

    let err = row.into_document().unwrap_err();
    assert!(matches!(err, DbError::Malformed { nm_id: 42, .. }));
    assert!(matches!(StoreError::from(err), StoreError::Malformed { nm_id: 42, .. }));
}

/// Compile-time smoke test: confirm that [`PipelineRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn pipeline_run_row_has_expected_fields() {
    let row = PipelineRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        trigger_source: "scheduler".to_string(),
        status: "running".to_string(),
        started_at: Utc::now(),
        completed_at: None,
        report: None,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.trigger_source, "scheduler");
    assert!(row.completed_at.is_none());
}

#[test]
fn run_status_strings_match_schema() {
    assert_eq!(RunStatus::Succeeded.as_str(), "succeeded");
    assert_eq!(RunStatus::Failed.as_str(), "failed");
    assert_eq!(RunStatus::Skipped.as_str(), "skipped");
}
