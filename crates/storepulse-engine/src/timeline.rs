//! Turning sparse observations into a continuous status timeline.
//!
//! A fixed 15-minute grid is laid over the business window, merged with the
//! real observations, and every grid point takes the status of the nearest
//! preceding observation (or the first following one for a leading gap).

use chrono::{DateTime, Duration, Utc};
use storepulse_core::{Observation, StoreStatus};

use crate::window::BusinessWindow;

pub const GRID_STEP_MINUTES: i64 = 15;

/// One point on the merged timeline; `status` is `None` for a synthetic grid
/// point that has not been resolved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinePoint {
    pub instant: DateTime<Utc>,
    pub status: Option<StoreStatus>,
}

/// A timeline point with a known status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPoint {
    pub instant: DateTime<Utc>,
    pub status: StoreStatus,
}

impl From<ResolvedPoint> for TimelinePoint {
    fn from(point: ResolvedPoint) -> Self {
        Self {
            instant: point.instant,
            status: Some(point.status),
        }
    }
}

impl From<&Observation> for TimelinePoint {
    fn from(observation: &Observation) -> Self {
        Self {
            instant: observation.timestamp,
            status: Some(observation.status),
        }
    }
}

/// Grid instants from `window.start` through `window.end` in 15-minute steps.
///
/// When the last step does not land exactly on `window.end`, `window.end` is
/// appended so the grid always closes the window.
#[must_use]
pub fn grid(window: &BusinessWindow) -> Vec<DateTime<Utc>> {
    let step = Duration::minutes(GRID_STEP_MINUTES);
    let mut instants = Vec::new();
    let mut current = window.start;
    while current <= window.end {
        instants.push(current);
        current += step;
    }
    if instants.last().is_some_and(|last| *last < window.end) {
        instants.push(window.end);
    }
    instants
}

/// Merge the grid for `window` with `observations`, ordered by instant.
///
/// At equal instants real observations come before grid points; observations
/// keep their relative order.
#[must_use]
pub fn merge(window: &BusinessWindow, observations: &[Observation]) -> Vec<TimelinePoint> {
    let mut points: Vec<TimelinePoint> = observations
        .iter()
        .map(TimelinePoint::from)
        .chain(grid(window).into_iter().map(|instant| TimelinePoint {
            instant,
            status: None,
        }))
        .collect();
    points.sort_by_key(|p| (p.instant, p.status.is_none()));
    points
}

/// Resolve every unknown status: forward-fill, then backward-fill the leading gap.
///
/// Returns an empty timeline when no point carries a known status; such a day
/// contributes no duration. Running this on its own output (lifted back into
/// [`TimelinePoint`]s) returns the same sequence.
#[must_use]
pub fn interpolate(points: &[TimelinePoint]) -> Vec<ResolvedPoint> {
    let mut statuses: Vec<Option<StoreStatus>> = points.iter().map(|p| p.status).collect();
    forward_fill(&mut statuses);
    backward_fill(&mut statuses);

    points
        .iter()
        .zip(statuses)
        .map(|(point, status)| {
            status.map(|status| ResolvedPoint {
                instant: point.instant,
                status,
            })
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

/// Merge and interpolate in one step.
#[must_use]
pub fn build_timeline(window: &BusinessWindow, observations: &[Observation]) -> Vec<ResolvedPoint> {
    interpolate(&merge(window, observations))
}

fn forward_fill(statuses: &mut [Option<StoreStatus>]) {
    let mut last = None;
    for status in statuses.iter_mut() {
        match status {
            Some(known) => last = Some(*known),
            None => *status = last,
        }
    }
}

fn backward_fill(statuses: &mut [Option<StoreStatus>]) {
    let mut next = None;
    for status in statuses.iter_mut().rev() {
        match status {
            Some(known) => next = Some(*known),
            None => *status = next,
        }
    }
}
