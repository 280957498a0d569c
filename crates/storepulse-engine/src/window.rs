//! Per-day business windows and the observations that fall inside them.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use storepulse_core::{BusinessHours, DailyHours, MissingHoursPolicy, Observation};

use crate::segment::DayGroup;
use crate::time_convert::local_to_utc;

/// Absolute-time interval during which a store is expected to be open on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusinessWindow {
    /// Inclusive at both ends.
    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant <= self.end
    }
}

/// A day's business window together with the observations inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDay<'a> {
    pub window: BusinessWindow,
    /// Non-empty, ascending.
    pub observations: &'a [Observation],
}

/// The business windows for `date`; empty when the store is closed that day.
///
/// The weekday of `date` selects the hours and every instant is anchored on
/// `date` itself. A closing time earlier than the opening time wraps within
/// the same local date: the store is open from midnight until closing and
/// from opening until the end of the day. Windows never leave their date, so
/// windows of different dates never overlap.
#[must_use]
pub fn business_windows(
    date: NaiveDate,
    hours: &BusinessHours,
    tz: Tz,
    policy: MissingHoursPolicy,
) -> Vec<BusinessWindow> {
    let Some(daily) = hours.for_weekday(date.weekday(), policy) else {
        return Vec::new();
    };
    let span = |start: NaiveTime, end: NaiveTime| BusinessWindow {
        start: local_to_utc(start, tz, date),
        end: local_to_utc(end, tz, date),
    };

    if daily.crosses_midnight() {
        let whole = DailyHours::full_day();
        vec![
            span(whole.start_local, daily.end_local),
            span(daily.start_local, whole.end_local),
        ]
    } else {
        vec![span(daily.start_local, daily.end_local)]
    }
}

/// Restrict a day group to its business windows.
///
/// Yields one [`BusinessDay`] per window that holds at least one observation,
/// in window order. Nothing is returned when the store is closed that day or
/// no observation falls inside a window; the day then contributes nothing
/// downstream.
#[must_use]
pub fn filter_business_hours<'a>(
    group: &DayGroup<'a>,
    hours: &BusinessHours,
    tz: Tz,
    policy: MissingHoursPolicy,
) -> Vec<BusinessDay<'a>> {
    // Groups are ascending, so each window's observations form one contiguous run.
    let observations = group.observations;
    business_windows(group.date, hours, tz, policy)
        .into_iter()
        .filter_map(|window| {
            let lo = observations.partition_point(|o| o.timestamp < window.start);
            let hi = observations.partition_point(|o| o.timestamp <= window.end);
            (lo < hi).then(|| BusinessDay {
                window,
                observations: &observations[lo..hi],
            })
        })
        .collect()
}
