//! Postgres persistence for stores, status observations and report lifecycles.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use storepulse_core::{AppConfig, CoreError};
use thiserror::Error;
use uuid::Uuid;

// Relative to this crate's Cargo.toml.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connection-pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections.min(config.db_max_connections),
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("report {report_id} is not in {expected_status} state")]
    InvalidReportTransition {
        report_id: Uuid,
        expected_status: &'static str,
    },
    #[error("invalid stored value: {0}")]
    InvalidRow(#[from] CoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Open a pool against `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
}

/// Apply pending migrations and return how many were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let before = count_applied_migrations(pool).await;
    MIGRATOR.run(pool).await?;
    let after = count_applied_migrations(pool).await;

    Ok(usize::try_from(after - before).unwrap_or(0))
}

// The bookkeeping table is missing on a fresh database; that counts as zero.
async fn count_applied_migrations(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Round-trip a trivial query to prove the pool can reach the database.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}


pub mod observations;
pub mod reports;
pub mod snapshot;
pub mod stores;

pub use observations::{
    insert_observations, latest_observation_timestamp, list_observations_since, ObservationRow,
};
pub use reports::{
    complete_report, create_report, fail_report, fail_stale_reports, get_report, StoredReportRow,
};
pub use snapshot::{load_snapshot, Snapshot};
pub use stores::{
    assemble_profiles, list_business_hours, list_store_profiles, list_stores,
    upsert_business_hours, upsert_stores, BusinessHoursRow, StoreRow,
};
