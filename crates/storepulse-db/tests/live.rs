//! Live integration tests for storepulse-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/storepulse-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, NaiveTime, TimeZone, Utc};
use storepulse_core::{Observation, ReportStatus, StoreStatus, DEFAULT_TIMEZONE};
use storepulse_db::{
    complete_report, create_report, fail_report, fail_stale_reports, get_report,
    insert_observations, latest_observation_timestamp, list_observations_since,
    list_store_profiles, load_snapshot, upsert_business_hours, upsert_stores, BusinessHoursRow,
    DbError, StoreRow,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store(id: &str, timezone: &str) -> StoreRow {
    StoreRow {
        store_id: id.to_string(),
        timezone: timezone.to_string(),
    }
}

fn hours(id: &str, day_of_week: i16, open: u32, close: u32) -> BusinessHoursRow {
    BusinessHoursRow {
        store_id: id.to_string(),
        day_of_week,
        start_time_local: NaiveTime::from_hms_opt(open, 0, 0).unwrap(),
        end_time_local: NaiveTime::from_hms_opt(close, 0, 0).unwrap(),
    }
}

fn observation(id: &str, day: u32, hour: u32, status: StoreStatus) -> (String, Observation) {
    let ts = Utc.with_ymd_and_hms(2023, 1, day, hour, 0, 0).unwrap();
    (id.to_string(), Observation::new(ts, status))
}

// ---------------------------------------------------------------------------
// Stores and hours
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn profiles_combine_stores_and_hours(pool: sqlx::PgPool) {
    upsert_stores(&pool, &[store("a", "Asia/Tokyo"), store("b", "UTC")])
        .await
        .expect("upsert stores");
    upsert_business_hours(&pool, &[hours("a", 0, 9, 17), hours("c", 1, 8, 12)])
        .await
        .expect("upsert hours");

    let profiles = list_store_profiles(&pool).await.expect("list profiles");
    let ids: Vec<&str> = profiles.iter().map(|p| p.store_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(profiles[0].timezone, "Asia/Tokyo");
    assert!(profiles[1].hours.is_empty());
    assert_eq!(profiles[2].timezone, DEFAULT_TIMEZONE);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upserts_replace_existing_rows(pool: sqlx::PgPool) {
    upsert_stores(&pool, &[store("a", "UTC")]).await.unwrap();
    upsert_stores(&pool, &[store("a", "Europe/Paris")]).await.unwrap();
    upsert_business_hours(&pool, &[hours("a", 0, 9, 17)]).await.unwrap();
    upsert_business_hours(&pool, &[hours("a", 0, 10, 18)]).await.unwrap();

    let profiles = list_store_profiles(&pool).await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].timezone, "Europe/Paris");
    let monday = profiles[0].hours.configured(chrono::Weekday::Mon).unwrap();
    assert_eq!(monday.start_local, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn observations_round_trip_in_store_then_time_order(pool: sqlx::PgPool) {
    assert_eq!(latest_observation_timestamp(&pool).await.unwrap(), None);

    let inserted = insert_observations(
        &pool,
        &[
            observation("b", 23, 10, StoreStatus::Active),
            observation("a", 23, 12, StoreStatus::Inactive),
            observation("a", 23, 9, StoreStatus::Active),
        ],
    )
    .await
    .unwrap();
    assert_eq!(inserted, 3);

    let latest = latest_observation_timestamp(&pool).await.unwrap();
    assert_eq!(latest, Some(Utc.with_ymd_and_hms(2023, 1, 23, 12, 0, 0).unwrap()));

    let since = Utc.with_ymd_and_hms(2023, 1, 23, 9, 30, 0).unwrap();
    let rows = list_observations_since(&pool, since).await.unwrap();
    assert_eq!(
        rows,
        vec![
            observation("a", 23, 12, StoreStatus::Inactive),
            observation("b", 23, 10, StoreStatus::Active),
        ]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn snapshot_limits_observations_to_lookback(pool: sqlx::PgPool) {
    upsert_stores(&pool, &[store("a", "UTC")]).await.unwrap();
    insert_observations(
        &pool,
        &[
            observation("a", 1, 9, StoreStatus::Active),
            observation("a", 20, 9, StoreStatus::Active),
            observation("a", 23, 9, StoreStatus::Inactive),
        ],
    )
    .await
    .unwrap();

    let snapshot = load_snapshot(&pool, Duration::weeks(1)).await.unwrap();
    assert_eq!(
        snapshot.reference_instant,
        Some(Utc.with_ymd_and_hms(2023, 1, 23, 9, 0, 0).unwrap())
    );
    assert_eq!(snapshot.profiles.len(), 1);
    assert_eq!(snapshot.observations.len(), 2);
}

// ---------------------------------------------------------------------------
// Report lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn report_moves_from_running_to_complete_once(pool: sqlx::PgPool) {
    let created = create_report(&pool).await.unwrap();
    assert_eq!(created.status().unwrap(), ReportStatus::Running);
    assert!(created.completed_at.is_none());

    complete_report(&pool, created.report_id, "store_id\n").await.unwrap();
    let fetched = get_report(&pool, created.report_id).await.unwrap();
    assert_eq!(fetched.status().unwrap(), ReportStatus::Complete);
    assert_eq!(fetched.report.as_deref(), Some("store_id\n"));
    assert!(fetched.completed_at.is_some());

    let err = fail_report(&pool, created.report_id, "late").await.unwrap_err();
    assert!(matches!(err, DbError::InvalidReportTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_report_keeps_error_message(pool: sqlx::PgPool) {
    let created = create_report(&pool).await.unwrap();
    fail_report(&pool, created.report_id, "database unreachable")
        .await
        .unwrap();

    let fetched = get_report(&pool, created.report_id).await.unwrap();
    assert_eq!(fetched.status().unwrap(), ReportStatus::Failed);
    assert_eq!(fetched.error_message.as_deref(), Some("database unreachable"));
    assert!(fetched.report.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_report_is_not_found(pool: sqlx::PgPool) {
    let err = get_report(&pool, uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_sweep_fails_only_old_running_reports(pool: sqlx::PgPool) {
    let old = create_report(&pool).await.unwrap();
    let done = create_report(&pool).await.unwrap();
    complete_report(&pool, done.report_id, "csv").await.unwrap();

    sqlx::query("UPDATE reports SET created_at = NOW() - INTERVAL '2 hours'")
        .execute(&pool)
        .await
        .unwrap();
    let fresh = create_report(&pool).await.unwrap();

    let swept = fail_stale_reports(&pool, Utc::now() - Duration::hours(1), "stale")
        .await
        .unwrap();
    assert_eq!(swept, 1);

    let old = get_report(&pool, old.report_id).await.unwrap();
    assert_eq!(old.status().unwrap(), ReportStatus::Failed);
    let done = get_report(&pool, done.report_id).await.unwrap();
    assert_eq!(done.status().unwrap(), ReportStatus::Complete);
    let fresh = get_report(&pool, fresh.report_id).await.unwrap();
    assert_eq!(fresh.status().unwrap(), ReportStatus::Running);
}
