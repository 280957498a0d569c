//! Synchronous report generation and stored-report lookup.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use storepulse_core::{AppConfig, ReportStatus};
use storepulse_engine::{build_report, EngineOptions, Report, ReportInput, TrailingWindow};
use uuid::Uuid;

/// Build a report from the current database contents and write it as CSV.
///
/// With `persist`, the finished CSV is also stored as a `Complete` report and
/// its id is printed.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded, the CSV cannot be
/// rendered or written, or persisting fails.
pub(crate) async fn run_report(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    output: Option<&Path>,
    persist: bool,
) -> anyhow::Result<()> {
    let options = EngineOptions {
        day_basis: config.day_basis,
        missing_hours: config.missing_hours,
    };

    let snapshot = storepulse_db::load_snapshot(pool, TrailingWindow::LastWeek.span())
        .await
        .context("failed to load report inputs")?;

    let now = snapshot.reference_instant.unwrap_or_else(Utc::now);

    let report = tokio::task::spawn_blocking(move || {
        let input = ReportInput::new(snapshot.profiles, snapshot.observations);
        build_report(&input, now, options)
    })
    .await
    .context("report worker terminated unexpectedly")?;

    let csv = report.to_csv().context("failed to render report")?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &csv)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {} row(s) to {}", report.rows.len(), path.display());
        }
        None => print!("{csv}"),
    }
    print_failures(&report);

    if persist {
        let row = storepulse_db::create_report(pool).await?;
        storepulse_db::complete_report(pool, row.report_id, &csv).await?;
        eprintln!("stored report {}", row.report_id);
    }

    Ok(())
}

fn print_failures(report: &Report) {
    if report.failures.is_empty() {
        return;
    }
    eprintln!(
        "{} store(s) reported as zero because aggregation failed:",
        report.failures.len()
    );
    for failure in &report.failures {
        eprintln!("  {}: {}", failure.store_id, failure.error);
    }
}

/// Print a stored report's status, and its failure reason if any.
///
/// # Errors
///
/// Returns an error if the report does not exist or the query fails.
pub(crate) async fn run_status(pool: &sqlx::PgPool, report_id: Uuid) -> anyhow::Result<()> {
    let row = storepulse_db::get_report(pool, report_id)
        .await
        .with_context(|| format!("report {report_id} not available"))?;

    let status = row.status()?;
    println!("{report_id}: {status} (created {})", row.created_at.to_rfc3339());
    match status {
        ReportStatus::Running => {}
        ReportStatus::Complete => {
            let rows = row
                .report
                .as_deref()
                .map_or(0, |csv| csv.lines().count().saturating_sub(1));
            println!("{rows} store row(s)");
        }
        ReportStatus::Failed => {
            println!("error: {}", row.error_message.as_deref().unwrap_or("unknown"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn status_of_unknown_report_is_an_error(pool: sqlx::PgPool) {
        let err = run_status(&pool, Uuid::new_v4())
            .await
            .expect_err("expected missing report");
        assert!(format!("{err:#}").contains("record not found"));
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            env: storepulse_core::Environment::Test,
            bind_addr: "127.0.0.1:0".parse().expect("addr"),
            log_level: "info".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            day_basis: storepulse_core::DayBasis::Utc,
            missing_hours: storepulse_core::MissingHoursPolicy::Closed,
            report_stale_after_secs: 3600,
        }
    }

    async fn temp_report_path() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("storepulse-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.expect("temp dir");
        dir.join("report.csv")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn persisted_report_is_complete(pool: sqlx::PgPool) {
        let path = temp_report_path().await;

        run_report(&pool, &test_config(), Some(&path), true)
            .await
            .expect("report");

        let csv = tokio::fs::read_to_string(&path).await.expect("read csv");
        assert!(csv.starts_with("store_id,"));

        let stored: (String,) = sqlx::query_as("SELECT status FROM reports")
            .fetch_one(&pool)
            .await
            .expect("stored report");
        assert_eq!(stored.0, "Complete");

        if let Some(dir) = path.parent() {
            tokio::fs::remove_dir_all(dir).await.ok();
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn report_window_ends_at_latest_stored_observation(pool: sqlx::PgPool) {
        for statement in [
            "INSERT INTO stores (store_id, timezone) VALUES ('s1', 'UTC')",
            "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local) \
             VALUES ('s1', 0, '09:00', '17:00')",
            "INSERT INTO store_status (store_id, status, timestamp_utc) VALUES \
             ('s1', 'inactive', '2023-01-23 09:00:00+00'), \
             ('s1', 'inactive', '2023-01-23 09:30:00+00')",
        ] {
            sqlx::query(statement).execute(&pool).await.expect("seed");
        }
        let path = temp_report_path().await;

        run_report(&pool, &test_config(), Some(&path), false)
            .await
            .expect("report");

        let csv = tokio::fs::read_to_string(&path).await.expect("read csv");
        assert_eq!(csv.lines().nth(1), Some("s1,0,0,0,30,0,0"));

        if let Some(dir) = path.parent() {
            tokio::fs::remove_dir_all(dir).await.ok();
        }
    }
}
