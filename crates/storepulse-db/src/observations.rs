//! Database operations for `store_status` observations.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::PgPool;
use storepulse_core::{Observation, StoreStatus};

use crate::DbError;

/// Rows per `INSERT ... UNNEST` statement during bulk import.
const INSERT_CHUNK_SIZE: usize = 5_000;

/// A row from the `store_status` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ObservationRow {
    pub store_id: String,
    pub status: String,
    pub timestamp_utc: DateTime<Utc>,
}

impl ObservationRow {
    /// Decode the row into a store id and a typed observation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if `status` is not a known store status.
    pub fn into_observation(self) -> Result<(String, Observation), DbError> {
        let status: StoreStatus = self.status.parse()?;
        Ok((self.store_id, Observation::new(self.timestamp_utc, status)))
    }
}

/// The newest observation timestamp across all stores, or `None` when the
/// table is empty.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_observation_timestamp(pool: &PgPool) -> Result<Option<DateTime<Utc>>, DbError> {
    let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(timestamp_utc) FROM store_status",
    )
    .fetch_one(pool)
    .await?;

    Ok(latest)
}

/// Every observation at or after `since`, ordered by store then timestamp.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a row carries an unknown status.
pub async fn list_observations_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<(String, Observation)>, DbError> {
    let mut rows = sqlx::query_as::<_, ObservationRow>(
        "SELECT store_id, status, timestamp_utc \
         FROM store_status \
         WHERE timestamp_utc >= $1 \
         ORDER BY store_id, timestamp_utc",
    )
    .bind(since)
    .fetch(pool);

    let mut observations = Vec::new();
    while let Some(row) = rows.try_next().await? {
        observations.push(row.into_observation()?);
    }

    Ok(observations)
}

/// Append observations in chunks inside a single transaction.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is committed then.
pub async fn insert_observations(
    pool: &PgPool,
    observations: &[(String, Observation)],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for chunk in observations.chunks(INSERT_CHUNK_SIZE) {
        let store_ids: Vec<&str> = chunk.iter().map(|(id, _)| id.as_str()).collect();
        let statuses: Vec<&str> = chunk.iter().map(|(_, o)| o.status.as_str()).collect();
        let timestamps: Vec<DateTime<Utc>> = chunk.iter().map(|(_, o)| o.timestamp).collect();

        let result = sqlx::query(
            "INSERT INTO store_status (store_id, status, timestamp_utc) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::timestamptz[])",
        )
        .bind(store_ids)
        .bind(statuses)
        .bind(timestamps)
        .execute(&mut *tx)
        .await?;

        inserted += usize::try_from(result.rows_affected()).unwrap_or(chunk.len());
        tracing::debug!(inserted, total = observations.len(), "observation chunk written");
    }

    tx.commit().await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row(status: &str) -> ObservationRow {
        ObservationRow {
            store_id: "s1".to_string(),
            status: status.to_string(),
            timestamp_utc: Utc.with_ymd_and_hms(2023, 1, 23, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn row_decodes_known_status() {
        let (store_id, observation) = row("inactive").into_observation().unwrap();
        assert_eq!(store_id, "s1");
        assert_eq!(observation.status, StoreStatus::Inactive);
    }

    #[test]
    fn row_with_unknown_status_is_invalid() {
        let err = row("closed").into_observation().unwrap_err();
        assert!(matches!(err, DbError::InvalidRow(_)));
    }
}
