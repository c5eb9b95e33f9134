//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the connection string and value ranges
//! - Check pool bounds against each other
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ConnectorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ConnectorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ConnectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let db = &config.database;

    match Url::parse(&db.uri) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "database.uri",
            format!("unsupported scheme '{}', expected http", url.scheme()),
        )),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("database.uri", e.to_string())),
    }

    if db.max_pool_size == 0 {
        errors.push(ValidationError::new("database.max_pool_size", "must be at least 1"));
    }
    if db.min_pool_size > db.max_pool_size {
        errors.push(ValidationError::new(
            "database.min_pool_size",
            format!("{} exceeds max_pool_size {}", db.min_pool_size, db.max_pool_size),
        ));
    }

    let positive = [
        ("database.connect_timeout_ms", db.connect_timeout_ms),
        ("database.socket_timeout_ms", db.socket_timeout_ms),
        ("database.max_idle_time_ms", db.max_idle_time_ms),
        ("circuit_breaker.cooldown_ms", config.circuit_breaker.cooldown_ms),
        ("health.probe_interval_ms", config.health.probe_interval_ms),
        ("health.probe_timeout_ms", config.health.probe_timeout_ms),
        ("health.activity_window_ms", config.health.activity_window_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.circuit_breaker.threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.threshold", "must be at least 1"));
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::new("health.failure_threshold", "must be at least 1"));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "not a socket address"));
        }
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
