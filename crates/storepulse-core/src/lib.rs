pub mod app_config;
pub mod config;
pub mod report;
pub mod store;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use report::ReportStatus;
pub use store::{
    BusinessHours, DailyHours, DayBasis, MissingHoursPolicy, Observation, StoreProfile,
    StoreStatus, DEFAULT_TIMEZONE,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid store status: {0}")]
    InvalidStatus(String),
    #[error("invalid day of week {0}: expected 0 (Monday) through 6 (Sunday)")]
    InvalidDayOfWeek(i64),
    #[error("invalid report status: {0}")]
    InvalidReportStatus(String),
    #[error("invalid day basis: {0}")]
    InvalidDayBasis(String),
    #[error("invalid missing-hours policy: {0}")]
    InvalidMissingHoursPolicy(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
