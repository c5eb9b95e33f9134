//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the connector.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::ConnectOptions;

/// Root configuration for the connection manager service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Data store connection settings.
    pub database: DatabaseConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: BreakerConfig,

    /// Health probing settings.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin HTTP surface.
    pub admin: AdminConfig,
}

/// Data store connection settings.
///
/// Defaults fit a shared low-tier database that allows only a handful of
/// concurrent connections.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string of the data API.
    pub uri: String,

    /// Maximum pooled sockets per connection.
    pub max_pool_size: usize,

    /// Sockets kept open while idle.
    pub min_pool_size: usize,

    /// Deadline for a connect attempt, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for one command round trip, in milliseconds.
    pub socket_timeout_ms: u64,

    /// Idle sockets are released after this many milliseconds.
    pub max_idle_time_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "http://127.0.0.1:27080".to_string(),
            max_pool_size: 2,
            min_pool_size: 0,
            connect_timeout_ms: 10_000,
            socket_timeout_ms: 45_000,
            max_idle_time_ms: 30_000,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Options handed to the transport for every new connection.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            max_pool_size: self.max_pool_size,
            min_pool_size: self.min_pool_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            socket_timeout: Duration::from_millis(self.socket_timeout_ms),
            max_idle_time: Duration::from_millis(self.max_idle_time_ms),
            retry_writes: false,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub threshold: u32,

    /// How long the breaker stays open before one trial, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

/// Health probing settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable the background probe task.
    pub enabled: bool,

    /// Delay between the end of one probe and the start of the next.
    pub probe_interval_ms: u64,

    /// Deadline for one ping round trip.
    pub probe_timeout_ms: u64,

    /// Probes are skipped when no activity happened within this window.
    pub activity_window_ms: u64,

    /// Consecutive probe failures that trip the breaker.
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval_ms: 120_000,
            probe_timeout_ms: 5_000,
            activity_window_ms: 300_000,
            failure_threshold: 3,
        }
    }
}

impl HealthConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn activity_window(&self) -> Duration {
        Duration::from_millis(self.activity_window_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin router.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
