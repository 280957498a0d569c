//! Splitting a store's observations into calendar-day groups.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use storepulse_core::{DayBasis, Observation};

use crate::error::EngineError;

/// A maximal run of consecutive observations that share a calendar day.
///
/// Never empty when produced by [`segment_by_day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayGroup<'a> {
    /// The day key shared by every observation in the group.
    pub date: NaiveDate,
    pub observations: &'a [Observation],
}

/// The calendar date of `timestamp` under `basis`.
///
/// `tz` is only consulted for [`DayBasis::StoreLocal`].
#[must_use]
pub fn day_key(basis: DayBasis, tz: Tz, timestamp: &DateTime<Utc>) -> NaiveDate {
    match basis {
        DayBasis::Utc => timestamp.date_naive(),
        DayBasis::StoreLocal => timestamp.with_timezone(&tz).date_naive(),
    }
}

/// Check that timestamps never decrease.
///
/// # Errors
///
/// Returns [`EngineError::UnsortedInput`] with the index of the first
/// observation that is earlier than its predecessor.
pub fn ensure_sorted(observations: &[Observation]) -> Result<(), EngineError> {
    match observations
        .windows(2)
        .position(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        Some(pos) => Err(EngineError::UnsortedInput { index: pos + 1 }),
        None => Ok(()),
    }
}

/// Split ascending `observations` into day groups using `key` for the date.
///
/// Single left-to-right scan; a new group starts whenever the key differs
/// from the running group's key. Groups borrow from the input.
///
/// # Errors
///
/// Returns [`EngineError::UnsortedInput`] if the input is not ascending.
pub fn segment_by_day<K>(
    observations: &[Observation],
    key: K,
) -> Result<Vec<DayGroup<'_>>, EngineError>
where
    K: Fn(&DateTime<Utc>) -> NaiveDate,
{
    ensure_sorted(observations)?;

    let mut groups = Vec::new();
    let mut start = 0;
    let mut current: Option<NaiveDate> = None;

    for (idx, observation) in observations.iter().enumerate() {
        let date = key(&observation.timestamp);
        match current {
            Some(day) if day == date => {}
            Some(day) => {
                groups.push(DayGroup {
                    date: day,
                    observations: &observations[start..idx],
                });
                start = idx;
                current = Some(date);
            }
            None => current = Some(date),
        }
    }

    if let Some(day) = current {
        groups.push(DayGroup {
            date: day,
            observations: &observations[start..],
        });
    }

    Ok(groups)
}
