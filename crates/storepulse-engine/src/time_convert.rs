//! Local wall-clock time to absolute instant conversion.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::EngineError;

/// How far back to look for the offset in force before a spring-forward gap.
const GAP_SEARCH_HOURS: i64 = 4;

/// Parse an IANA timezone name.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if the name is not in the tz database.
pub fn parse_timezone(name: &str) -> Result<Tz, EngineError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(name.to_string()))
}

/// Combine `date` with `local`, read the result as wall-clock time in the
/// named timezone, and return the matching UTC instant.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if `timezone` is not recognized.
pub fn local_to_absolute(
    local: NaiveTime,
    timezone: &str,
    date: NaiveDate,
) -> Result<DateTime<Utc>, EngineError> {
    let tz = parse_timezone(timezone)?;
    Ok(local_to_utc(local, tz, date))
}

/// Same as [`local_to_absolute`] for an already-parsed zone.
///
/// Ambiguous wall times (clocks falling back) resolve to the earlier instant.
/// Wall times inside a spring-forward gap are read with the offset that was in
/// force just before the gap, so they land after it.
#[must_use]
pub fn local_to_utc(local: NaiveTime, tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(local);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&(naive - offset_before_gap(tz, naive))),
    }
}

fn offset_before_gap(tz: Tz, naive: NaiveDateTime) -> Duration {
    (1..=GAP_SEARCH_HOURS)
        .find_map(|h| tz.from_local_datetime(&(naive - Duration::hours(h))).earliest())
        .map_or_else(Duration::zero, |dt| {
            Duration::seconds(i64::from(dt.offset().fix().local_minus_utc()))
        })
}
