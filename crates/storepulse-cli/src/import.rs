//! Loading the three source CSV datasets into the database.
//!
//! Columns are located by header name, so column order does not matter.
//! Blank lines are skipped; any malformed record aborts the import of that
//! file with its line number.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use storepulse_core::{Observation, StoreStatus};
use storepulse_db::{BusinessHoursRow, StoreRow};

#[derive(Debug, Default)]
pub(crate) struct ImportPaths {
    pub store_status: Option<PathBuf>,
    pub business_hours: Option<PathBuf>,
    pub timezones: Option<PathBuf>,
}

/// Import whichever datasets were given.
///
/// Timezones load first, then business hours, then observations.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or a write fails.
pub(crate) async fn run_import(pool: &sqlx::PgPool, paths: &ImportPaths) -> anyhow::Result<()> {
    if paths.store_status.is_none() && paths.business_hours.is_none() && paths.timezones.is_none()
    {
        bail!("nothing to import; pass --store-status, --business-hours and/or --timezones");
    }

    if let Some(path) = &paths.timezones {
        let rows = parse_timezones(&read(path).await?).with_context(|| parse_failure(path))?;
        let count = storepulse_db::upsert_stores(pool, &rows).await?;
        println!("timezones: {count} store(s) upserted from {}", path.display());
    }

    if let Some(path) = &paths.business_hours {
        let rows = parse_business_hours(&read(path).await?).with_context(|| parse_failure(path))?;
        let count = storepulse_db::upsert_business_hours(pool, &rows).await?;
        println!("business hours: {count} row(s) upserted from {}", path.display());
    }

    if let Some(path) = &paths.store_status {
        let rows = parse_store_status(&read(path).await?).with_context(|| parse_failure(path))?;
        let count = storepulse_db::insert_observations(pool, &rows).await?;
        println!("store status: {count} observation(s) inserted from {}", path.display());
    }

    Ok(())
}

async fn read(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

fn parse_failure(path: &Path) -> String {
    format!("failed to parse {}", path.display())
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatusRecord {
    store_id: String,
    status: String,
    timestamp_utc: String,
}

#[derive(Debug, Deserialize)]
struct HoursRecord {
    store_id: String,
    #[serde(alias = "dayOfWeek", alias = "day")]
    day_of_week: i16,
    start_time_local: String,
    end_time_local: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneRecord {
    store_id: String,
    #[serde(alias = "timezone_str")]
    timezone: String,
}

/// Parse `store_id,status,timestamp_utc` records.
pub(crate) fn parse_store_status(text: &str) -> anyhow::Result<Vec<(String, Observation)>> {
    read_records(text, |record: StatusRecord| {
        let status: StoreStatus = record.status.parse()?;
        let timestamp = parse_timestamp(&record.timestamp_utc)?;
        Ok((record.store_id, Observation::new(timestamp, status)))
    })
}

/// Parse `store_id,dayOfWeek,start_time_local,end_time_local` records.
pub(crate) fn parse_business_hours(text: &str) -> anyhow::Result<Vec<BusinessHoursRow>> {
    read_records(text, |record: HoursRecord| {
        if !(0..=6).contains(&record.day_of_week) {
            bail!(
                "day of week {} outside 0 (Monday) through 6 (Sunday)",
                record.day_of_week
            );
        }
        Ok(BusinessHoursRow {
            store_id: record.store_id,
            day_of_week: record.day_of_week,
            start_time_local: parse_local_time(&record.start_time_local)?,
            end_time_local: parse_local_time(&record.end_time_local)?,
        })
    })
}

/// Parse `store_id,timezone_str` records, rejecting unknown zone names.
pub(crate) fn parse_timezones(text: &str) -> anyhow::Result<Vec<StoreRow>> {
    read_records(text, |record: TimezoneRecord| {
        storepulse_engine::parse_timezone(&record.timezone)?;
        Ok(StoreRow {
            store_id: record.store_id,
            timezone: record.timezone,
        })
    })
}

/// Deserialize every record of `text` by header name and convert it with
/// `convert`. Failures carry the record's line number.
fn read_records<R, T, F>(text: &str, convert: F) -> anyhow::Result<Vec<T>>
where
    R: DeserializeOwned,
    F: Fn(R) -> anyhow::Result<T>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("unreadable header")?.clone();
    if headers.iter().all(str::is_empty) {
        bail!("file is empty");
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let row = record
            .deserialize::<R>(Some(&headers))
            .map_err(anyhow::Error::from)
            .and_then(&convert)
            .with_context(|| format!("line {line}"))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Accepts `2023-01-22 12:09:39.388884 UTC`, the same without fraction or
/// suffix, and RFC 3339.
pub(crate) fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    let naive = trimmed.strip_suffix("UTC").map_or(trimmed, str::trim_end);

    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp {raw:?}"))
}

fn parse_local_time(raw: &str) -> anyhow::Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .with_context(|| format!("invalid local time {raw:?}"))
}

#[cfg(test)]
#[path = "import_test.rs"]
mod tests;
