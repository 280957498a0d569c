//! Loading the read-only inputs of one report run.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use storepulse_core::{Observation, StoreProfile};

use crate::observations::{latest_observation_timestamp, list_observations_since};
use crate::stores::list_store_profiles;
use crate::DbError;

/// Everything a report run reads, captured once at the start of the run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Newest observation timestamp; `None` when there are no observations.
    pub reference_instant: Option<DateTime<Utc>>,
    pub profiles: Vec<StoreProfile>,
    pub observations: Vec<(String, Observation)>,
}

/// Load store profiles and the observations within `lookback` of the newest
/// observation.
///
/// # Errors
///
/// Returns [`DbError`] if any query fails or a stored row cannot be decoded.
pub async fn load_snapshot(pool: &PgPool, lookback: Duration) -> Result<Snapshot, DbError> {
    let reference_instant = latest_observation_timestamp(pool).await?;
    let profiles = list_store_profiles(pool).await?;

    let observations = match reference_instant {
        Some(latest) => list_observations_since(pool, latest - lookback).await?,
        None => Vec::new(),
    };

    tracing::debug!(
        stores = profiles.len(),
        observations = observations.len(),
        reference_instant = ?reference_instant,
        "snapshot loaded"
    );

    Ok(Snapshot {
        reference_instant,
        profiles,
        observations,
    })
}
