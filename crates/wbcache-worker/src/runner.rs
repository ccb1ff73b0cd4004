//! Wraps each pipeline tick in a `pipeline_runs` row.

use sqlx::PgPool;
use wbcache_aggregator::{Aggregator, AggregatorError, TickOutcome};
use wbcache_db::RunStatus;

pub struct TickRunner {
    aggregator: Aggregator,
    pool: PgPool,
}

impl TickRunner {
    pub fn new(aggregator: Aggregator, pool: PgPool) -> Self {
        Self { aggregator, pool }
    }

    /// Runs one tick and records its outcome. Run-log failures are logged
    /// and never stop the tick itself.
    pub async fn run(&self, trigger_source: &str) -> Result<TickOutcome, AggregatorError> {
        let run_id = match wbcache_db::start_pipeline_run(&self.pool, trigger_source).await {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::warn!(error = %e, "could not record pipeline run start");
                None
            }
        };

        let result = self.aggregator.run_tick().await;

        if let Some(id) = run_id {
            self.record(id, &result).await;
        }
        if let Err(e) = &result {
            tracing::error!(trigger_source, error = %e, "pipeline tick failed");
        }
        result
    }

    async fn record(&self, id: i64, result: &Result<TickOutcome, AggregatorError>) {
        let (status, report, error) = match result {
            Ok(TickOutcome::Skipped) => (RunStatus::Skipped, None, None),
            Ok(TickOutcome::Completed(report)) => match serde_json::to_value(report) {
                Ok(value) => (RunStatus::Succeeded, Some(value), None),
                Err(e) => (RunStatus::Succeeded, None, Some(format!("report not serialisable: {e}"))),
            },
            Err(e) => (RunStatus::Failed, None, Some(format!("{e:#}"))),
        };

        if let Err(e) = wbcache_db::complete_pipeline_run(
            &self.pool,
            id,
            status,
            report.as_ref(),
            error.as_deref(),
        )
        .await
        {
            tracing::warn!(run_id = id, error = %e, "could not record pipeline run outcome");
        }
    }
}
