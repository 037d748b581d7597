//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Level names must be known to `tracing`
//! - The metrics address must parse when the exporter is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ScopeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::config::schema::ScopeConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: unknown log level {value:?}")]
    UnknownLevel { field: String, value: String },

    #[error("observability.log_level must not be empty")]
    EmptyLogLevel,

    #[error("observability.metrics_address {value:?} is not a socket address")]
    InvalidMetricsAddress { value: String },
}

/// Parse an event level name such as `"debug"` (case-insensitive).
pub fn parse_level(field: &str, value: &str) -> Result<Level, ValidationError> {
    value.trim().parse().map_err(|_| ValidationError::UnknownLevel {
        field: field.to_string(),
        value: value.to_string(),
    })
}

pub fn validate_config(config: &ScopeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, value) in config.structured.entries() {
        if let Err(e) = parse_level(&format!("structured.{name}"), value) {
            errors.push(e);
        }
    }

    let log_level = config.observability.log_level.trim();
    if log_level.is_empty() {
        errors.push(ValidationError::EmptyLogLevel);
    } else if log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::UnknownLevel {
            field: "observability.log_level".to_string(),
            value: log_level.to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress {
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
