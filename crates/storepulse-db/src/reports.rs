//! Database operations for the `reports` lifecycle table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use storepulse_core::ReportStatus;
use uuid::Uuid;

use crate::DbError;

/// A row from the `reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredReportRow {
    pub id: i64,
    pub report_id: Uuid,
    pub status: String,
    /// Rendered CSV; set only once the report is `Complete`.
    pub report: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredReportRow {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if the stored status is not recognized.
    pub fn status(&self) -> Result<ReportStatus, DbError> {
        Ok(self.status.parse()?)
    }
}

/// Creates a new report in `Running` status with a fresh public id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_report(pool: &PgPool) -> Result<StoredReportRow, DbError> {
    let report_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, StoredReportRow>(
        "INSERT INTO reports (report_id, status) \
         VALUES ($1, 'Running') \
         RETURNING id, report_id, status, report, error_message, created_at, completed_at",
    )
    .bind(report_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a `Running` report as `Complete` and stores its CSV.
///
/// # Errors
///
/// Returns [`DbError::InvalidReportTransition`] if the report is not
/// `Running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_report(pool: &PgPool, report_id: Uuid, csv: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reports \
         SET status = 'Complete', report = $1, completed_at = NOW() \
         WHERE report_id = $2 AND status = 'Running'",
    )
    .bind(csv)
    .bind(report_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidReportTransition {
            report_id,
            expected_status: ReportStatus::Running.as_str(),
        });
    }

    Ok(())
}

/// Marks a `Running` report as `Failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidReportTransition`] if the report is not
/// `Running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_report(
    pool: &PgPool,
    report_id: Uuid,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reports \
         SET status = 'Failed', error_message = $1, completed_at = NOW() \
         WHERE report_id = $2 AND status = 'Running'",
    )
    .bind(error_message)
    .bind(report_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidReportTransition {
            report_id,
            expected_status: ReportStatus::Running.as_str(),
        });
    }

    Ok(())
}

/// Fetches a report by its public id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no report has that id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_report(pool: &PgPool, report_id: Uuid) -> Result<StoredReportRow, DbError> {
    let row = sqlx::query_as::<_, StoredReportRow>(
        "SELECT id, report_id, status, report, error_message, created_at, completed_at \
         FROM reports \
         WHERE report_id = $1",
    )
    .bind(report_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fails every report still `Running` that was created before `cutoff`.
///
/// Returns the number of reports transitioned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_reports(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    error_message: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE reports \
         SET status = 'Failed', error_message = $1, completed_at = NOW() \
         WHERE status = 'Running' AND created_at < $2",
    )
    .bind(error_message)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
