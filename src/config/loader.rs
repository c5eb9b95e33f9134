//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ConnectorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CONNECTOR_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}")]
    Override { var: String, value: String },

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

/// Load configuration: TOML file (optional), then environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ConnectorConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ConnectorConfig::default(),
    };

    apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Override {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Apply `CONNECTOR_*` overrides from the given variables.
///
/// Unknown `CONNECTOR_*` names are ignored.
pub fn apply_env_overrides<I>(config: &mut ConnectorConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (var, value) in vars {
        let Some(key) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match key {
            "DATABASE_URI" => config.database.uri = value.clone(),
            "MAX_POOL_SIZE" => config.database.max_pool_size = parse(&var, &value)?,
            "MIN_POOL_SIZE" => config.database.min_pool_size = parse(&var, &value)?,
            "CONNECT_TIMEOUT_MS" => config.database.connect_timeout_ms = parse(&var, &value)?,
            "SOCKET_TIMEOUT_MS" => config.database.socket_timeout_ms = parse(&var, &value)?,
            "BREAKER_THRESHOLD" => config.circuit_breaker.threshold = parse(&var, &value)?,
            "BREAKER_COOLDOWN_MS" => config.circuit_breaker.cooldown_ms = parse(&var, &value)?,
            "PROBE_INTERVAL_MS" => config.health.probe_interval_ms = parse(&var, &value)?,
            "ACTIVITY_WINDOW_MS" => config.health.activity_window_ms = parse(&var, &value)?,
            "ADMIN_API_KEY" => config.admin.api_key = value.clone(),
            "LOG_LEVEL" => config.observability.log_level = value.clone(),
            _ => tracing::debug!(var = %var, "Ignoring unknown override"),
        }
    }
    Ok(())
}
