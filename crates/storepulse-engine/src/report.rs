//! Unit normalization and CSV rendering of per-store results.

use serde::Serialize;

use crate::aggregate::{AggregateResult, TrailingWindow};
use crate::error::RenderError;

/// One report line: last-hour counters in minutes, day/week counters in hours.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub store_id: String,
    pub uptime_last_hour: i64,
    pub uptime_last_day: i64,
    pub uptime_last_week: i64,
    pub downtime_last_hour: i64,
    pub downtime_last_day: i64,
    pub downtime_last_week: i64,
}

impl ReportRow {
    #[must_use]
    pub fn from_aggregate(result: &AggregateResult) -> Self {
        let uptime = result.totals.uptime.in_report_units();
        let downtime = result.totals.downtime.in_report_units();
        Self {
            store_id: result.store_id.clone(),
            uptime_last_hour: uptime.last_hour,
            uptime_last_day: uptime.last_day,
            uptime_last_week: uptime.last_week,
            downtime_last_hour: downtime.last_hour,
            downtime_last_day: downtime.last_day,
            downtime_last_week: downtime.last_week,
        }
    }

    /// An all-zero row for a store that contributed nothing.
    #[must_use]
    pub fn zero(store_id: impl Into<String>) -> Self {
        Self::from_aggregate(&AggregateResult::empty(store_id))
    }
}

/// Column headers in output order, each counter labeled with its unit.
#[must_use]
pub fn header() -> Vec<String> {
    let mut columns = vec!["store_id".to_string()];
    for kind in ["uptime", "downtime"] {
        for window in TrailingWindow::ALL {
            columns.push(format!(
                "{kind}_{} (in {})",
                window.label(),
                window.report_unit().label()
            ));
        }
    }
    columns
}

/// Render rows as CSV text with a header line.
///
/// # Errors
///
/// Returns [`RenderError`] if a row cannot be serialized.
pub fn render_csv(rows: &[ReportRow]) -> Result<String, RenderError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(header())?;
    for row in rows {
        writer.serialize(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
