//! Active health probing.
//!
//! # Responsibilities
//! - Periodically ping the cached connection
//! - Skip probes while the breaker is open, the connection is down, or the
//!   service has been idle longer than the activity window
//! - Trip the breaker after repeated consecutive probe failures
//!
//! # Design Decisions
//! - One owned task, started at most once, joined by shutdown
//! - The next probe is scheduled only after the previous one finished
//! - Probe failures are absorbed; only the threshold-th one escalates

use serde_json::json;
use std::sync::{Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::state::{HealthSnapshot, HealthStats};
use super::{ProbeTarget, SkipReason};
use crate::config::HealthConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::{self, Bounded};
use crate::transport::{TransportError, TransportHandle};

/// Why a single probe failed. Never surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("ping timed out after {0:?}")]
    Timeout(Duration),

    #[error("ping failed: {0}")]
    Transport(TransportError),

    /// The server answered without `ok`.
    #[error("ping rejected: {0}")]
    Rejected(String),
}

/// Result of one probe cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Skipped(SkipReason),
    Healthy { latency: Duration },
    Failed { failure: ProbeFailure, consecutive: u32 },
    /// The failure streak reached the threshold and the breaker was tripped.
    Tripped { failure: ProbeFailure, consecutive: u32 },
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Skipped(_) => "skipped",
            ProbeOutcome::Healthy { .. } => "healthy",
            ProbeOutcome::Failed { .. } => "failed",
            ProbeOutcome::Tripped { .. } => "tripped",
        }
    }
}

/// Periodic prober for the cached connection.
pub struct HealthMonitor {
    config: HealthConfig,
    stats: Mutex<HealthStats>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(HealthStats::default()),
            task: Mutex::new(None),
        }
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, HealthStats> {
        self.stats.lock().expect("health stats mutex poisoned")
    }

    pub fn snapshot(&self, now: Instant) -> HealthSnapshot {
        self.stats().snapshot(now)
    }

    /// True if probes tripped the breaker and nothing has succeeded since.
    pub fn trip_pending(&self) -> bool {
        self.stats().trip_pending
    }

    pub fn record_connected(&self) {
        self.stats().record_connected();
    }

    /// Zero all counters.
    pub fn reset_stats(&self) {
        *self.stats() = HealthStats::default();
        tracing::info!("Health statistics reset");
    }

    /// Whether the probe task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .expect("health task mutex poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start the probe loop unless it is already running.
    ///
    /// Returns true if a new task was spawned.
    pub fn start<P: ProbeTarget>(&self, target: Weak<P>, stop: watch::Receiver<bool>) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut slot = self.task.lock().expect("health task mutex poisoned");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        let interval = self.config.probe_interval();
        *slot = Some(tokio::spawn(run(target, interval, stop)));
        true
    }

    /// Take ownership of the probe task so it can be joined.
    pub fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().expect("health task mutex poisoned").take()
    }

    /// Run one probe cycle against `target`.
    pub async fn probe_once<P: ProbeTarget>(&self, target: &P) -> ProbeOutcome {
        let handle = match target.probe_candidate() {
            Ok(handle) => handle,
            Err(reason) => {
                tracing::debug!(reason = reason.as_str(), "Skipping health probe");
                metrics::record_probe_skipped(reason.as_str());
                return ProbeOutcome::Skipped(reason);
            }
        };

        if !target.activity().is_recently_active(self.config.activity_window()) {
            self.stats().skipped_idle += 1;
            tracing::debug!(
                window_ms = self.config.activity_window_ms,
                "Skipping health probe, connection idle"
            );
            metrics::record_probe_skipped(SkipReason::Idle.as_str());
            return ProbeOutcome::Skipped(SkipReason::Idle);
        }

        let started = Instant::now();
        let result = timeouts::within(
            self.config.probe_timeout(),
            handle.run_admin_command(json!({ "ping": 1 })),
        )
        .await;
        let finished = Instant::now();
        let latency = finished.saturating_duration_since(started);

        let failure = match result {
            Ok(_) => {
                self.stats().record_success(finished, latency);
                target.activity().record_at(finished);
                metrics::record_probe(true, latency);
                tracing::debug!(
                    connection_id = %handle.id(),
                    latency_ms = latency.as_millis() as u64,
                    "Health probe succeeded"
                );
                return ProbeOutcome::Healthy { latency };
            }
            Err(Bounded::Elapsed(deadline)) => ProbeFailure::Timeout(deadline),
            Err(Bounded::Failed(TransportError::Command(reply))) => ProbeFailure::Rejected(reply),
            Err(Bounded::Failed(e)) => ProbeFailure::Transport(e),
        };

        metrics::record_probe(false, latency);
        let consecutive = self.stats().record_failure(finished, latency);

        if consecutive < self.config.failure_threshold {
            tracing::warn!(
                connection_id = %handle.id(),
                consecutive,
                threshold = self.config.failure_threshold,
                error = %failure,
                "Health probe failed"
            );
            return ProbeOutcome::Failed { failure, consecutive };
        }

        let Some(degraded) = target.degrade(handle.id()) else {
            // Already replaced by a newer connection; its own probes decide.
            tracing::debug!(connection_id = %handle.id(), "Probed connection no longer cached");
            return ProbeOutcome::Failed { failure, consecutive };
        };
        self.stats().record_trip();
        tracing::error!(
            connection_id = %handle.id(),
            consecutive,
            error = %failure,
            "Health probes failing, treating connection as degraded"
        );
        if let Err(e) = degraded.close().await {
            tracing::debug!(error = %e, "Closing degraded connection failed");
        }
        ProbeOutcome::Tripped { failure, consecutive }
    }
}

async fn run<P: ProbeTarget>(target: Weak<P>, interval: Duration, mut stop: watch::Receiver<bool>) {
    tracing::info!(interval_ms = interval.as_millis() as u64, "Health monitor starting");

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let Some(target) = target.upgrade() else {
            break;
        };
        target.health().probe_once(&*target).await;
    }

    tracing::info!("Health monitor stopped");
}
