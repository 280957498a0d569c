//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring stale-report sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every five minutes, on the minute.
const STALE_SWEEP_SCHEDULE: &str = "0 */5 * * * *";

const STALE_REPORT_MESSAGE: &str = "report build did not finish; marked failed by stale sweep";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<storepulse_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_stale_report_sweep(&scheduler, pool, config.report_stale_after_secs).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the sweep that fails reports stuck in `Running`.
///
/// A server crash mid-build leaves its report `Running`; once older than
/// `stale_after_secs` it is moved to `Failed` so pollers get a terminal answer.
async fn register_stale_report_sweep(
    scheduler: &JobScheduler,
    pool: PgPool,
    stale_after_secs: u64,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(STALE_SWEEP_SCHEDULE, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            sweep_stale_reports(&pool, stale_after_secs).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Fail every `Running` report created more than `stale_after_secs` ago.
///
/// Returns the number of reports transitioned; errors are logged, not raised.
pub async fn sweep_stale_reports(pool: &PgPool, stale_after_secs: u64) -> u64 {
    let Some(cutoff) = i64::try_from(stale_after_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|stale_after| Utc::now().checked_sub_signed(stale_after))
    else {
        tracing::debug!(stale_after_secs, "scheduler: stale threshold out of range; skipping sweep");
        return 0;
    };

    match storepulse_db::fail_stale_reports(pool, cutoff, STALE_REPORT_MESSAGE).await {
        Ok(0) => {
            tracing::debug!("scheduler: no stale reports");
            0
        }
        Ok(count) => {
            tracing::warn!(count, "scheduler: marked stale reports failed");
            count
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: stale report sweep failed");
            0
        }
    }
}
