//! Trailing-window duration accounting over resolved timelines.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use storepulse_core::StoreStatus;

use crate::timeline::ResolvedPoint;

/// One of the three windows measured backward from the report's reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrailingWindow {
    LastHour,
    LastDay,
    LastWeek,
}

/// Unit a window's counter is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportUnit {
    Minutes,
    Hours,
}

impl ReportUnit {
    /// Convert a whole-minute count, flooring partial hours.
    #[must_use]
    pub fn from_minutes(self, minutes: i64) -> i64 {
        match self {
            ReportUnit::Minutes => minutes,
            ReportUnit::Hours => minutes.div_euclid(60),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReportUnit::Minutes => "minutes",
            ReportUnit::Hours => "hours",
        }
    }
}

impl TrailingWindow {
    pub const ALL: [TrailingWindow; 3] = [
        TrailingWindow::LastHour,
        TrailingWindow::LastDay,
        TrailingWindow::LastWeek,
    ];

    #[must_use]
    pub fn span(self) -> Duration {
        match self {
            TrailingWindow::LastHour => Duration::hours(1),
            TrailingWindow::LastDay => Duration::days(1),
            TrailingWindow::LastWeek => Duration::weeks(1),
        }
    }

    #[must_use]
    pub fn report_unit(self) -> ReportUnit {
        match self {
            TrailingWindow::LastHour => ReportUnit::Minutes,
            TrailingWindow::LastDay | TrailingWindow::LastWeek => ReportUnit::Hours,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TrailingWindow::LastHour => "last_hour",
            TrailingWindow::LastDay => "last_day",
            TrailingWindow::LastWeek => "last_week",
        }
    }
}

/// A counter per trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Buckets {
    pub last_hour: i64,
    pub last_day: i64,
    pub last_week: i64,
}

impl Buckets {
    #[must_use]
    pub fn get(&self, window: TrailingWindow) -> i64 {
        match window {
            TrailingWindow::LastHour => self.last_hour,
            TrailingWindow::LastDay => self.last_day,
            TrailingWindow::LastWeek => self.last_week,
        }
    }

    fn get_mut(&mut self, window: TrailingWindow) -> &mut i64 {
        match window {
            TrailingWindow::LastHour => &mut self.last_hour,
            TrailingWindow::LastDay => &mut self.last_day,
            TrailingWindow::LastWeek => &mut self.last_week,
        }
    }

    /// Minute counters converted to each window's report unit.
    #[must_use]
    pub fn in_report_units(&self) -> Buckets {
        let mut out = Buckets::default();
        for window in TrailingWindow::ALL {
            *out.get_mut(window) = window.report_unit().from_minutes(self.get(window));
        }
        out
    }
}

/// Uptime and downtime minutes per trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub uptime: Buckets,
    pub downtime: Buckets,
}

impl WindowTotals {
    fn record(&mut self, status: StoreStatus, window: TrailingWindow, minutes: i64) {
        let buckets = match status {
            StoreStatus::Active => &mut self.uptime,
            StoreStatus::Inactive => &mut self.downtime,
        };
        *buckets.get_mut(window) += minutes;
    }
}

/// Accumulated totals for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub store_id: String,
    /// Whole minutes.
    pub totals: WindowTotals,
}

impl AggregateResult {
    #[must_use]
    pub fn empty(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            totals: WindowTotals::default(),
        }
    }
}

/// Fold one day's resolved timeline into `totals`.
///
/// Each consecutive pair `(prev, curr)` is attributed to `curr.status`. The
/// interval counts toward every window that `curr` falls in, clipped to that
/// window's start, in whole minutes (floored). The walk stops at the first
/// point later than `now`.
///
/// The last-week bucket is clipped like the other two rather than receiving
/// every interval whole: history older than `now - 7d` is ignored, so
/// `last_week` never exceeds 168 hours.
#[must_use]
pub fn accumulate_day(
    totals: WindowTotals,
    points: &[ResolvedPoint],
    now: DateTime<Utc>,
) -> WindowTotals {
    points
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .take_while(|(_, curr)| curr.instant <= now)
        .fold(totals, |mut acc, (prev, curr)| {
            for window in TrailingWindow::ALL {
                if let Some(minutes) = minutes_in_window(prev.instant, curr.instant, now, window) {
                    acc.record(curr.status, window, minutes);
                }
            }
            acc
        })
}

/// Whole minutes of `(prev, curr]` inside `window`, or `None` if `curr` is
/// older than the window.
fn minutes_in_window(
    prev: DateTime<Utc>,
    curr: DateTime<Utc>,
    now: DateTime<Utc>,
    window: TrailingWindow,
) -> Option<i64> {
    let window_start = now - window.span();
    if curr < window_start {
        return None;
    }
    let from = prev.max(window_start);
    Some((curr - from).num_minutes().max(0))
}
