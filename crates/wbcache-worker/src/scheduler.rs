//! Fixed-interval scheduling of pipeline ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runner::TickRunner;

/// Builds and starts the scheduler with one repeating tick job.
///
/// The returned handle must be kept alive for the lifetime of the process.
/// Overlapping ticks are turned away by the aggregator's run guard.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    runner: Arc<TickRunner>,
    interval: Duration,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let runner = Arc::clone(&runner);
        Box::pin(async move {
            // Errors are logged and recorded inside the runner.
            let _ = runner.run("scheduler").await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    Ok(scheduler)
}
