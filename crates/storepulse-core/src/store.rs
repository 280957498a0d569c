//! Store-level domain types: poll observations, business hours, and the
//! policies that decide how gaps in that data are read.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Timezone assumed for a store that has observations but no timezone row.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreStatus::Active => "active",
            StoreStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StoreStatus::Active),
            "inactive" => Ok(StoreStatus::Inactive),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// A single poll result for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub status: StoreStatus,
}

impl Observation {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, status: StoreStatus) -> Self {
        Self { timestamp, status }
    }
}

/// Opening and closing wall-clock times for one weekday, in the store's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHours {
    pub start_local: NaiveTime,
    pub end_local: NaiveTime,
}

impl DailyHours {
    /// 00:00:00 through 23:59:59, the hours of a store that is always open.
    #[must_use]
    pub fn full_day() -> Self {
        Self {
            start_local: NaiveTime::default(),
            end_local: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn new(start_local: NaiveTime, end_local: NaiveTime) -> Self {
        Self {
            start_local,
            end_local,
        }
    }

    /// Whether the closing time is earlier in the day than the opening time.
    #[must_use]
    pub fn crosses_midnight(&self) -> bool {
        self.end_local < self.start_local
    }
}

/// What a weekday with no configured hours means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingHoursPolicy {
    /// Zero-length window: the day contributes nothing.
    #[default]
    Closed,
    /// Treat the day as open for its full 24 hours.
    OpenAllDay,
}

impl FromStr for MissingHoursPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(MissingHoursPolicy::Closed),
            "open" | "open_all_day" | "24x7" => Ok(MissingHoursPolicy::OpenAllDay),
            _ => Err(CoreError::InvalidMissingHoursPolicy(s.to_string())),
        }
    }
}

/// Which calendar date an observation belongs to when splitting by day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBasis {
    /// The UTC date of the timestamp.
    #[default]
    Utc,
    /// The date of the timestamp in the store's own timezone.
    StoreLocal,
}

impl FromStr for DayBasis {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" => Ok(DayBasis::Utc),
            "local" | "store_local" => Ok(DayBasis::StoreLocal),
            _ => Err(CoreError::InvalidDayBasis(s.to_string())),
        }
    }
}

/// Weekly business hours, indexed Monday = 0 through Sunday = 6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    days: [Option<DailyHours>; 7],
}

impl BusinessHours {
    /// Hours with every weekday unconfigured.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Hours with the same window on all seven days.
    #[must_use]
    pub fn every_day(hours: DailyHours) -> Self {
        Self {
            days: [Some(hours); 7],
        }
    }

    /// Set the hours for `day_of_week` (0 = Monday).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDayOfWeek`] if `day_of_week` is outside `0..=6`.
    pub fn set(&mut self, day_of_week: i64, hours: DailyHours) -> Result<(), CoreError> {
        let slot = usize::try_from(day_of_week)
            .ok()
            .and_then(|idx| self.days.get_mut(idx))
            .ok_or(CoreError::InvalidDayOfWeek(day_of_week))?;
        *slot = Some(hours);
        Ok(())
    }

    /// The configured hours for a weekday, if any.
    #[must_use]
    pub fn configured(&self, weekday: Weekday) -> Option<DailyHours> {
        self.days[weekday.num_days_from_monday() as usize]
    }

    /// The hours that apply on `weekday`, resolving an unconfigured day through `policy`.
    #[must_use]
    pub fn for_weekday(&self, weekday: Weekday, policy: MissingHoursPolicy) -> Option<DailyHours> {
        self.configured(weekday).or(match policy {
            MissingHoursPolicy::Closed => None,
            MissingHoursPolicy::OpenAllDay => Some(DailyHours::full_day()),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Option::is_none)
    }
}

/// Everything the engine needs to know about one store besides its observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub store_id: String,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
    pub hours: BusinessHours,
}

impl StoreProfile {
    /// A profile for a store known only from its observations.
    #[must_use]
    pub fn unconfigured(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            hours: BusinessHours::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn store_status_parses_case_insensitively() {
        assert_eq!(" Active ".parse::<StoreStatus>().unwrap(), StoreStatus::Active);
        assert_eq!("INACTIVE".parse::<StoreStatus>().unwrap(), StoreStatus::Inactive);
        assert!(matches!(
            "closed".parse::<StoreStatus>(),
            Err(CoreError::InvalidStatus(ref s)) if s == "closed"
        ));
    }

    #[test]
    fn store_status_serializes_lowercase() {
        let json = serde_json::to_string(&StoreStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }

    #[test]
    fn business_hours_set_rejects_out_of_range_day() {
        let mut hours = BusinessHours::none();
        assert!(matches!(
            hours.set(7, DailyHours::new(t(9, 0), t(17, 0))),
            Err(CoreError::InvalidDayOfWeek(7))
        ));
        assert!(matches!(
            hours.set(-1, DailyHours::new(t(9, 0), t(17, 0))),
            Err(CoreError::InvalidDayOfWeek(-1))
        ));
        assert!(hours.is_empty());
    }

    #[test]
    fn business_hours_index_monday_as_zero() {
        let mut hours = BusinessHours::none();
        hours.set(0, DailyHours::new(t(9, 0), t(17, 0))).unwrap();
        assert_eq!(
            hours.configured(Weekday::Mon),
            Some(DailyHours::new(t(9, 0), t(17, 0)))
        );
        assert_eq!(hours.configured(Weekday::Sun), None);
    }

    #[test]
    fn missing_day_resolves_through_policy() {
        let hours = BusinessHours::none();
        assert_eq!(hours.for_weekday(Weekday::Tue, MissingHoursPolicy::Closed), None);
        assert_eq!(
            hours.for_weekday(Weekday::Tue, MissingHoursPolicy::OpenAllDay),
            Some(DailyHours::full_day())
        );
    }

    #[test]
    fn configured_day_ignores_policy() {
        let hours = BusinessHours::every_day(DailyHours::new(t(8, 0), t(12, 0)));
        assert_eq!(
            hours.for_weekday(Weekday::Sat, MissingHoursPolicy::OpenAllDay),
            Some(DailyHours::new(t(8, 0), t(12, 0)))
        );
    }

    #[test]
    fn full_day_spans_midnight_to_last_second() {
        assert_eq!(DailyHours::full_day().start_local, t(0, 0));
        assert_eq!(
            DailyHours::full_day().end_local,
            NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        );
        assert!(!DailyHours::full_day().crosses_midnight());
        assert!(DailyHours::new(t(18, 0), t(2, 0)).crosses_midnight());
    }

    #[test]
    fn policies_parse_from_config_strings() {
        assert_eq!("closed".parse::<MissingHoursPolicy>().unwrap(), MissingHoursPolicy::Closed);
        assert_eq!("24x7".parse::<MissingHoursPolicy>().unwrap(), MissingHoursPolicy::OpenAllDay);
        assert_eq!("local".parse::<DayBasis>().unwrap(), DayBasis::StoreLocal);
        assert_eq!("UTC".parse::<DayBasis>().unwrap(), DayBasis::Utc);
        assert!("sometimes".parse::<DayBasis>().is_err());
    }

    #[test]
    fn unconfigured_profile_uses_default_timezone() {
        let profile = StoreProfile::unconfigured("s1");
        assert_eq!(profile.timezone, DEFAULT_TIMEZONE);
        assert!(profile.hours.is_empty());
    }
}
