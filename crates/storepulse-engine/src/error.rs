use thiserror::Error;

/// Failures that stop aggregation for a single store.
///
/// A store with no configured hours or no observations is not an error; it
/// simply aggregates to zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unrecognized timezone: {0}")]
    InvalidTimezone(String),

    #[error("observations out of order at index {index}: timestamps must be ascending")]
    UnsortedInput { index: usize },
}

/// Failure to serialize a finished report.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write report CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("report CSV is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
