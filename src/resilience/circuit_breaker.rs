//! Circuit breaker guarding new connection attempts.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: data store assumed down, attempts fail fast
//! - Half-Open: the single trial attempt is in flight
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold (or a health-probe trip)
//! Open → Half-Open: first admission after the cooldown
//! Half-Open → Closed: trial succeeds (failure_count = 0)
//! Half-Open → Open: trial fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker for the one data store
//! - Fail fast in Open state (no transport call at all)
//! - Single trial in Half-Open; later callers coalesce onto it

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of asking the breaker for permission to attempt a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; normal flow applies.
    Closed,
    /// Cooldown elapsed; the caller owns the single trial attempt.
    Trial,
    /// A trial is already running; join it instead of starting another.
    TrialPending,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    /// When the current cooldown started.
    opened_at: Option<Instant>,
    /// Number of Closed → Open transitions.
    open_count: u64,
}

/// Read-only breaker snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub is_open: bool,
    pub failure_count: u32,
    pub threshold: u32,
    pub cooldown_ms: u64,
    /// Milliseconds since the most recent recorded failure.
    pub last_failure_ms_ago: Option<u64>,
    /// Remaining cooldown while open.
    pub retry_after_ms: Option<u64>,
    pub open_count: u64,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            threshold: config.threshold.max(1),
            cooldown: Duration::from_millis(config.cooldown_ms),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                opened_at: None,
                open_count: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    /// Ask for permission to proceed.
    ///
    /// Returns the remaining cooldown when the breaker rejects the caller.
    /// The first admission after the cooldown moves the breaker to Half-Open.
    pub fn admit(&self, now: Instant) -> Result<Admission, Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Closed),
            CircuitState::HalfOpen => Ok(Admission::TrialPending),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.cooldown {
                    tracing::info!(
                        failure_count = inner.failure_count,
                        "Circuit breaker cooldown elapsed, admitting trial attempt"
                    );
                    inner.state = CircuitState::HalfOpen;
                    Ok(Admission::Trial)
                } else {
                    Err(self.cooldown - elapsed)
                }
            }
        }
    }

    /// Record a successful connection. Closes the breaker from any state.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(
                previous = ?inner.state,
                "Circuit breaker closed after successful attempt"
            );
            metrics::record_breaker_open(false);
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
    }

    /// Record a failed attempt. Returns true if this failure opened the breaker.
    pub fn record_failure(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.threshold {
                    tracing::warn!(
                        failure_count = inner.failure_count,
                        threshold = self.threshold,
                        cooldown_ms = self.cooldown.as_millis() as u64,
                        "Circuit breaker opened"
                    );
                    Self::open(&mut inner, now);
                    true
                } else {
                    tracing::debug!(
                        failure_count = inner.failure_count,
                        threshold = self.threshold,
                        "Connection failure recorded"
                    );
                    false
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    failure_count = inner.failure_count,
                    "Trial attempt failed, circuit breaker re-opened"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                false
            }
            CircuitState::Open => {
                // A late failure while open restarts the cooldown.
                inner.opened_at = Some(now);
                false
            }
        }
    }

    /// Open the breaker immediately, regardless of the failure count.
    pub fn trip(&self, now: Instant) {
        let mut inner = self.lock();
        inner.last_failure = Some(now);
        inner.failure_count = inner.failure_count.max(self.threshold);
        if inner.state == CircuitState::Closed {
            tracing::warn!(threshold = self.threshold, "Circuit breaker tripped");
            Self::open(&mut inner, now);
        } else {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
        }
    }

    fn open(inner: &mut BreakerInner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.open_count += 1;
        metrics::record_breaker_open(true);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// True while Open or Half-Open.
    pub fn is_open(&self) -> bool {
        self.state() != CircuitState::Closed
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_after_ms = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let elapsed = now.saturating_duration_since(opened_at);
                Some(self.cooldown.saturating_sub(elapsed).as_millis() as u64)
            }
            _ => None,
        };
        BreakerSnapshot {
            state: inner.state,
            is_open: inner.state != CircuitState::Closed,
            failure_count: inner.failure_count,
            threshold: self.threshold,
            cooldown_ms: self.cooldown.as_millis() as u64,
            last_failure_ms_ago: inner
                .last_failure
                .map(|t| now.saturating_duration_since(t).as_millis() as u64),
            retry_after_ms,
            open_count: inner.open_count,
        }
    }
}
