//! Database operations for `stores` and `business_hours`.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use sqlx::PgPool;
use storepulse_core::{BusinessHours, DailyHours, StoreProfile, DEFAULT_TIMEZONE};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `stores` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoreRow {
    pub store_id: String,
    pub timezone: String,
}

/// A row from the `business_hours` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BusinessHoursRow {
    pub store_id: String,
    /// 0 = Monday through 6 = Sunday.
    pub day_of_week: i16,
    pub start_time_local: NaiveTime,
    pub end_time_local: NaiveTime,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns every store with a timezone row, ordered by `store_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stores(pool: &PgPool) -> Result<Vec<StoreRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(
        "SELECT store_id, timezone FROM stores ORDER BY store_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns every configured business-hours row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_business_hours(pool: &PgPool) -> Result<Vec<BusinessHoursRow>, DbError> {
    let rows = sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT store_id, day_of_week, start_time_local, end_time_local \
         FROM business_hours \
         ORDER BY store_id, day_of_week",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Loads every store's timezone and weekly hours as engine-ready profiles.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or [`DbError::InvalidRow`] if
/// a stored `day_of_week` is out of range.
pub async fn list_store_profiles(pool: &PgPool) -> Result<Vec<StoreProfile>, DbError> {
    let stores = list_stores(pool).await?;
    let hours = list_business_hours(pool).await?;
    assemble_profiles(stores, hours)
}

/// Joins store rows with their hours rows.
///
/// A store with hours but no timezone row gets [`DEFAULT_TIMEZONE`]. Profiles
/// are returned ordered by `store_id`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRow`] if a `day_of_week` is outside 0..=6.
pub fn assemble_profiles(
    stores: Vec<StoreRow>,
    hours: Vec<BusinessHoursRow>,
) -> Result<Vec<StoreProfile>, DbError> {
    let mut profiles: BTreeMap<String, StoreProfile> = stores
        .into_iter()
        .map(|row| {
            let profile = StoreProfile {
                store_id: row.store_id.clone(),
                timezone: row.timezone,
                hours: BusinessHours::none(),
            };
            (row.store_id, profile)
        })
        .collect();

    for row in hours {
        let profile = profiles
            .entry(row.store_id.clone())
            .or_insert_with(|| StoreProfile {
                store_id: row.store_id.clone(),
                timezone: DEFAULT_TIMEZONE.to_string(),
                hours: BusinessHours::none(),
            });
        profile.hours.set(
            i64::from(row.day_of_week),
            DailyHours::new(row.start_time_local, row.end_time_local),
        )?;
    }

    Ok(profiles.into_values().collect())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Upsert store timezone rows.
///
/// Returns the number of rows processed. All upserts run inside a single
/// transaction; if any fails the batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn upsert_stores(pool: &PgPool, rows: &[StoreRow]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO stores (store_id, timezone) \
             VALUES ($1, $2) \
             ON CONFLICT (store_id) DO UPDATE SET timezone = EXCLUDED.timezone",
        )
        .bind(&row.store_id)
        .bind(&row.timezone)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len())
}

/// Upsert weekly business-hours rows; a later row for the same store and
/// weekday replaces an earlier one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn upsert_business_hours(
    pool: &PgPool,
    rows: &[BusinessHoursRow],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (store_id, day_of_week) DO UPDATE SET \
                 start_time_local = EXCLUDED.start_time_local, \
                 end_time_local = EXCLUDED.end_time_local",
        )
        .bind(&row.store_id)
        .bind(row.day_of_week)
        .bind(row.start_time_local)
        .bind(row.end_time_local)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len())
}
