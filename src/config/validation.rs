//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Validate addresses and URLs the service will use later
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.host must not be empty")]
    EmptyHost,

    #[error("server.shutdown_timeout must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("server.request_timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("database.port must not be zero")]
    ZeroDatabasePort,

    #[error("financial_api.alphavantage.base_url is not a valid http(s) URL: {0}")]
    InvalidApiUrl(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Check an [`AppConfig`] for values that deserialize fine but cannot work.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.server.shutdown_timeout.as_duration().is_zero() {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if config.server.request_timeout.as_duration().is_zero() {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.database.port == 0 {
        errors.push(ValidationError::ZeroDatabasePort);
    }

    let base_url = &config.financial_api.alphavantage.base_url;
    if !base_url.is_empty() {
        match url::Url::parse(base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidApiUrl(base_url.clone())),
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
