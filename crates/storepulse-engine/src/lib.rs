//! Uptime/downtime aggregation for StorePulse.
//!
//! Takes each store's status observations, restricts them to the store's local
//! business hours, interpolates a 15-minute status timeline per day, and sums
//! the time spent active and inactive over the last hour, day and week relative
//! to a reference instant. Stores are processed independently.

pub mod aggregate;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod time_convert;
pub mod timeline;
pub mod window;

pub use aggregate::{accumulate_day, AggregateResult, Buckets, TrailingWindow, WindowTotals};
pub use error::{EngineError, RenderError};
pub use pipeline::{
    aggregate_store, build_report, EngineOptions, Report, ReportInput, StoreFailure,
};
pub use report::{header, render_csv, ReportRow};
pub use segment::{day_key, segment_by_day, DayGroup};
pub use time_convert::{local_to_absolute, local_to_utc, parse_timezone};
pub use timeline::{build_timeline, interpolate, ResolvedPoint, TimelinePoint};
pub use window::{business_windows, filter_business_hours, BusinessDay, BusinessWindow};
