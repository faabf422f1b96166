//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable CONFIG_PATH is not set or empty")]
    MissingPath,

    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Override {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from the file named by `CONFIG_PATH`, with process
/// environment overrides.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .ok_or(ConfigError::MissingPath)?;

    load_config(Path::new(&path))
}

/// Load and validate configuration from a TOML file, applying overrides from
/// the process environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: AppConfig = toml::from_str(&content)?;

    apply_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override file values with environment variables.
///
/// The variable name is the dotted key upper-cased with `.` replaced by `_`,
/// so `server.port` is overridden by `SERVER_PORT`.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SERVER_HOST") {
        config.server.host = v;
    }
    if let Some(v) = lookup("SERVER_PORT") {
        config.server.port = parse_override("SERVER_PORT", v)?;
    }
    if let Some(v) = lookup("SERVER_SHUTDOWN_TIMEOUT") {
        config.server.shutdown_timeout = parse_override("SERVER_SHUTDOWN_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("SERVER_REQUEST_TIMEOUT") {
        config.server.request_timeout = parse_override("SERVER_REQUEST_TIMEOUT", v)?;
    }

    if let Some(v) = lookup("DATABASE_HOST") {
        config.database.host = v;
    }
    if let Some(v) = lookup("DATABASE_PORT") {
        config.database.port = parse_override("DATABASE_PORT", v)?;
    }
    if let Some(v) = lookup("DATABASE_USER") {
        config.database.user = v;
    }
    if let Some(v) = lookup("DATABASE_PASSWORD") {
        config.database.password = v;
    }
    if let Some(v) = lookup("DATABASE_NAME") {
        config.database.name = v;
    }

    if let Some(v) = lookup("FINANCIAL_API_ALPHAVANTAGE_BASE_URL") {
        config.financial_api.alphavantage.base_url = v;
    }
    if let Some(v) = lookup("FINANCIAL_API_ALPHAVANTAGE_API_KEY") {
        config.financial_api.alphavantage.api_key = v;
    }

    Ok(())
}

fn parse_override<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Override {
        key,
        reason: e.to_string(),
        value,
    })
}
