//! Health probe statistics.
//!
//! # Invariants
//! - `total_pings` counts executed probes only; skipped probes are not counted
//! - Counters only grow until an explicit reset
//! - `trip_pending` is set when probes trip the breaker and cleared by the
//!   next successful probe or connect

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Accumulated probe statistics.
#[derive(Debug, Clone, Default)]
pub struct HealthStats {
    pub total_pings: u64,
    pub successful_pings: u64,
    pub consecutive_failures: u32,
    pub last_ping: Option<Instant>,
    pub last_latency: Option<Duration>,
    /// Probes skipped because the connection was idle.
    pub skipped_idle: u64,
    /// Breaker trips caused by probes.
    pub trips: u64,
    pub trip_pending: bool,
}

impl HealthStats {
    pub fn record_success(&mut self, at: Instant, latency: Duration) {
        self.total_pings += 1;
        self.successful_pings += 1;
        self.consecutive_failures = 0;
        self.last_ping = Some(at);
        self.last_latency = Some(latency);
        self.trip_pending = false;
    }

    /// Record a failure and return the consecutive failure count.
    pub fn record_failure(&mut self, at: Instant, latency: Duration) -> u32 {
        self.total_pings += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_ping = Some(at);
        self.last_latency = Some(latency);
        self.consecutive_failures
    }

    pub fn record_trip(&mut self) {
        self.trips += 1;
        self.trip_pending = true;
    }

    /// A fresh connection starts with a clean failure streak.
    pub fn record_connected(&mut self) {
        self.consecutive_failures = 0;
        self.trip_pending = false;
    }

    pub fn snapshot(&self, now: Instant) -> HealthSnapshot {
        HealthSnapshot {
            total_pings: self.total_pings,
            successful_pings: self.successful_pings,
            consecutive_failures: self.consecutive_failures,
            last_ping_ms_ago: self
                .last_ping
                .map(|t| now.saturating_duration_since(t).as_millis() as u64),
            last_latency_ms: self.last_latency.map(|d| d.as_millis() as u64),
            skipped_idle: self.skipped_idle,
            trips: self.trips,
            trip_pending: self.trip_pending,
        }
    }
}

/// Read-only probe statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub total_pings: u64,
    pub successful_pings: u64,
    pub consecutive_failures: u32,
    pub last_ping_ms_ago: Option<u64>,
    pub last_latency_ms: Option<u64>,
    pub skipped_idle: u64,
    pub trips: u64,
    pub trip_pending: bool,
}
