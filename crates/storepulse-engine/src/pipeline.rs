//! Per-run orchestration: fan out over every store, fan in to one report.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use storepulse_core::{DayBasis, MissingHoursPolicy, Observation, StoreProfile};

use crate::aggregate::{accumulate_day, AggregateResult, WindowTotals};
use crate::error::{EngineError, RenderError};
use crate::report::{render_csv, ReportRow};
use crate::segment::{day_key, segment_by_day};
use crate::time_convert::parse_timezone;
use crate::timeline::build_timeline;
use crate::window::filter_business_hours;

/// Policies that shape one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub day_basis: DayBasis,
    pub missing_hours: MissingHoursPolicy,
}

/// Read-only snapshot of everything one report run aggregates.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    profiles: BTreeMap<String, StoreProfile>,
    observations: HashMap<String, Vec<Observation>>,
}

impl ReportInput {
    /// Build a snapshot from store profiles and `(store_id, observation)` pairs.
    ///
    /// Observations are grouped per store and sorted by timestamp. A store that
    /// has observations but no profile gets [`StoreProfile::unconfigured`].
    pub fn new<P, O>(profiles: P, observations: O) -> Self
    where
        P: IntoIterator<Item = StoreProfile>,
        O: IntoIterator<Item = (String, Observation)>,
    {
        let mut profiles: BTreeMap<String, StoreProfile> = profiles
            .into_iter()
            .map(|p| (p.store_id.clone(), p))
            .collect();

        let mut grouped: HashMap<String, Vec<Observation>> = HashMap::new();
        for (store_id, observation) in observations {
            grouped.entry(store_id).or_default().push(observation);
        }
        for (store_id, list) in &mut grouped {
            list.sort_by_key(|o| o.timestamp);
            profiles
                .entry(store_id.clone())
                .or_insert_with(|| StoreProfile::unconfigured(store_id.clone()));
        }

        Self {
            profiles,
            observations: grouped,
        }
    }

    /// The latest observation timestamp across every store.
    #[must_use]
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.observations
            .values()
            .filter_map(|list| list.last())
            .map(|o| o.timestamp)
            .max()
    }

    #[must_use]
    pub fn store_count(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.observations.values().map(Vec::len).sum()
    }

    fn observations_for(&self, store_id: &str) -> &[Observation] {
        self.observations
            .get(store_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A store whose aggregation failed; it is reported as an all-zero row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub store_id: String,
    pub error: EngineError,
}

/// A complete report snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub now: DateTime<Utc>,
    /// One row per store, ordered by store id.
    pub rows: Vec<ReportRow>,
    pub failures: Vec<StoreFailure>,
}

impl Report {
    /// The rows as CSV text with a header line.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if a row cannot be serialized.
    pub fn to_csv(&self) -> Result<String, RenderError> {
        render_csv(&self.rows)
    }
}

/// Aggregate one store's ascending observations against `now`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if the profile's timezone is not
/// recognized, or [`EngineError::UnsortedInput`] if `observations` are not
/// ascending.
pub fn aggregate_store(
    profile: &StoreProfile,
    observations: &[Observation],
    now: DateTime<Utc>,
    options: EngineOptions,
) -> Result<AggregateResult, EngineError> {
    let tz = parse_timezone(&profile.timezone)?;
    let days = segment_by_day(observations, |ts| day_key(options.day_basis, tz, ts))?;

    let totals = days
        .iter()
        .flat_map(|group| {
            filter_business_hours(group, &profile.hours, tz, options.missing_hours)
        })
        .fold(WindowTotals::default(), |totals, day| {
            let timeline = build_timeline(&day.window, day.observations);
            accumulate_day(totals, &timeline, now)
        });

    Ok(AggregateResult {
        store_id: profile.store_id.clone(),
        totals,
    })
}

/// Build the report for every store in `input`.
///
/// Stores are independent; a store that fails is logged and emitted as an
/// all-zero row so the report still completes.
#[must_use]
pub fn build_report(input: &ReportInput, now: DateTime<Utc>, options: EngineOptions) -> Report {
    let mut rows = Vec::with_capacity(input.profiles.len());
    let mut failures = Vec::new();

    for (store_id, profile) in &input.profiles {
        let observations = input.observations_for(store_id);

        if observations.is_empty() {
            tracing::debug!(store_id = %store_id, "no observations in window; emitting zero row");
            rows.push(ReportRow::zero(store_id.as_str()));
            continue;
        }

        if profile.hours.is_empty() && options.missing_hours == MissingHoursPolicy::Closed {
            tracing::debug!(store_id = %store_id, "no business hours configured; emitting zero row");
            rows.push(ReportRow::zero(store_id.as_str()));
            continue;
        }

        match aggregate_store(profile, observations, now, options) {
            Ok(result) => rows.push(ReportRow::from_aggregate(&result)),
            Err(error) => {
                tracing::warn!(
                    store_id = %store_id,
                    error = %error,
                    "store aggregation failed; emitting zero row"
                );
                rows.push(ReportRow::zero(store_id.as_str()));
                failures.push(StoreFailure {
                    store_id: store_id.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        stores = rows.len(),
        failed = failures.len(),
        now = %now,
        "report built"
    );

    Report {
        now,
        rows,
        failures,
    }
}
