use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;

    let env = Environment::from_name(&or_default("STOREPULSE_ENV", "development"));

    let bind_addr: SocketAddr = parse_var(&lookup, "STOREPULSE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("STOREPULSE_LOG_LEVEL", "info");

    let db_max_connections = parse_var(&lookup, "STOREPULSE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_var(&lookup, "STOREPULSE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&lookup, "STOREPULSE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let day_basis = parse_var(&lookup, "STOREPULSE_DAY_BASIS", "utc")?;
    let missing_hours = parse_var(&lookup, "STOREPULSE_MISSING_HOURS", "closed")?;
    let report_stale_after_secs =
        parse_var(&lookup, "STOREPULSE_REPORT_STALE_AFTER_SECS", "3600")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        day_basis,
        missing_hours,
        report_stale_after_secs,
    })
}

/// Read `var` (or `default` when unset) and parse it with `FromStr`.
fn parse_var<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
