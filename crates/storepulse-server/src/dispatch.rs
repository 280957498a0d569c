//! Background report builds.
//!
//! Each triggered report is built exactly once on its own task: the snapshot
//! is loaded asynchronously, aggregation runs on a blocking worker thread, and
//! the report row is moved from `Running` to `Complete` or `Failed`.

use anyhow::Context;
use chrono::Utc;
use sqlx::PgPool;
use storepulse_engine::{build_report, EngineOptions, ReportInput, TrailingWindow};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Spawn the build for a freshly created report.
pub fn spawn_report_build(pool: PgPool, report_id: Uuid, options: EngineOptions) -> JoinHandle<()> {
    tokio::spawn(async move { run_report_build(&pool, report_id, options).await })
}

/// Build the report and record its terminal status.
pub async fn run_report_build(pool: &PgPool, report_id: Uuid, options: EngineOptions) {
    tracing::info!(report_id = %report_id, "report build started");

    match generate_csv(pool, options).await {
        Ok(csv) => match storepulse_db::complete_report(pool, report_id, &csv).await {
            Ok(()) => tracing::info!(report_id = %report_id, bytes = csv.len(), "report complete"),
            Err(e) => {
                tracing::error!(report_id = %report_id, error = %e, "failed to store report");
            }
        },
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!(report_id = %report_id, error = %message, "report build failed");
            if let Err(e) = storepulse_db::fail_report(pool, report_id, &message).await {
                tracing::error!(report_id = %report_id, error = %e, "failed to mark report failed");
            }
        }
    }
}

/// Load the current snapshot and render the full report as CSV.
///
/// The report's reference instant is the latest stored observation, read in
/// the same snapshot that applies the lookback cutoff.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded, the worker thread
/// panics, or the CSV cannot be rendered.
pub async fn generate_csv(pool: &PgPool, options: EngineOptions) -> anyhow::Result<String> {
    let snapshot = storepulse_db::load_snapshot(pool, TrailingWindow::LastWeek.span())
        .await
        .context("failed to load report inputs")?;
    let now = snapshot.reference_instant.unwrap_or_else(Utc::now);

    tokio::task::spawn_blocking(move || {
        let input = ReportInput::new(snapshot.profiles, snapshot.observations);
        build_report(&input, now, options).to_csv()
    })
    .await
    .context("report worker terminated unexpectedly")?
    .context("failed to render report")
}

#[cfg(test)]
mod tests {
    use storepulse_core::ReportStatus;

    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_database_builds_header_only_report(pool: PgPool) {
        let row = storepulse_db::create_report(&pool).await.expect("create");
        run_report_build(&pool, row.report_id, EngineOptions::default()).await;

        let stored = storepulse_db::get_report(&pool, row.report_id)
            .await
            .expect("get");
        assert_eq!(stored.status().expect("status"), ReportStatus::Complete);
        let csv = stored.report.expect("csv");
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("store_id,"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn terminal_report_is_not_rebuilt(pool: PgPool) {
        let row = storepulse_db::create_report(&pool).await.expect("create");
        storepulse_db::fail_report(&pool, row.report_id, "cancelled")
            .await
            .expect("fail");

        run_report_build(&pool, row.report_id, EngineOptions::default()).await;

        let stored = storepulse_db::get_report(&pool, row.report_id)
            .await
            .expect("get");
        assert_eq!(stored.status().expect("status"), ReportStatus::Failed);
        assert!(stored.report.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stores_without_observations_get_zero_rows(pool: PgPool) {
        sqlx::query("INSERT INTO stores (store_id, timezone) VALUES ('idle', 'Europe/Berlin')")
            .execute(&pool)
            .await
            .expect("insert store");

        let csv = generate_csv(&pool, EngineOptions::default())
            .await
            .expect("csv");
        assert_eq!(csv.lines().nth(1), Some("idle,0,0,0,0,0,0"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn report_is_measured_from_latest_stored_observation(pool: PgPool) {
        for statement in [
            "INSERT INTO stores (store_id, timezone) VALUES ('s1', 'UTC')",
            "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local) \
             VALUES ('s1', 0, '09:00', '17:00')",
            "INSERT INTO store_status (store_id, status, timestamp_utc) VALUES \
             ('s1', 'active', '2023-01-23 09:00:00+00'), \
             ('s1', 'active', '2023-01-23 10:00:00+00')",
        ] {
            sqlx::query(statement).execute(&pool).await.expect("seed");
        }

        let csv = generate_csv(&pool, EngineOptions::default())
            .await
            .expect("csv");
        assert_eq!(csv.lines().nth(1), Some("s1,60,1,1,0,0,0"));
    }
}
