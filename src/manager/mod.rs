//! Connection manager subsystem.
//!
//! # Data Flow
//! ```text
//! connect() / force_reconnect()
//!     → flow.rs (breaker admission, cache, coalescing, attempt)
//!         → Transport::connect (bounded by connect timeout)
//!         → on success: cache, listeners (once), health monitor (once)
//!
//! health monitor (health/active.rs)
//!     → ProbeTarget impl below (candidate handle, degrade on repeated failure)
//!
//! transport events (health/passive.rs)
//!     → EventSink impl below (drop the cached handle; an error also trips the breaker)
//!
//! shutdown()
//!     → lifecycle/shutdown.rs (once) → teardown below
//! ```
//!
//! # Design Decisions
//! - An explicitly constructed context object, cloned into consumers
//! - Locks are short and never held across an await; order is
//!   flow → breaker → health stats
//! - Background tasks hold weak references and end with the manager

pub mod flow;
pub mod stats;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ConnectorConfig;
use crate::error::ConnectionResult;
use crate::health::passive::EventSink;
use crate::health::{ActivityClock, HealthMonitor, ProbeOutcome, ProbeTarget, SkipReason};
use crate::lifecycle::Shutdown;
use crate::resilience::CircuitBreaker;
use crate::transport::{
    ConnectionId, ConnectionState, Transport, TransportEvent, TransportEventKind, TransportHandle,
};

use self::flow::FlowState;
pub use self::stats::{ConnectionSnapshot, ManagerStats};

/// Extra time shutdown grants an in-flight probe beyond its own timeout.
const PROBE_JOIN_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct Inner<T: Transport> {
    pub(crate) config: ConnectorConfig,
    pub(crate) transport: T,
    pub(crate) flow: Mutex<FlowState<T::Handle>>,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) activity: ActivityClock,
    pub(crate) health: HealthMonitor,
    pub(crate) shutdown: Shutdown,
    pub(crate) listener: Mutex<Option<JoinHandle<()>>>,
}

/// Resilient access to the single data store.
///
/// Cheap to clone; every clone shares the same connection, breaker and
/// statistics. Construct one per process (or per test) and pass it to the
/// code that needs the database.
pub struct ConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager in the `Disconnected` state. No connection is opened yet.
    pub fn new(config: ConnectorConfig, transport: T) -> Self {
        let inner = Inner {
            breaker: CircuitBreaker::new(&config.circuit_breaker),
            health: HealthMonitor::new(config.health.clone()),
            activity: ActivityClock::new(),
            flow: Mutex::new(FlowState::new()),
            shutdown: Shutdown::new(),
            listener: Mutex::new(None),
            transport,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get a usable connection, reusing the cached one when possible.
    ///
    /// Concurrent callers share a single attempt. Fails fast with
    /// [`ConnectionError::CircuitOpen`](crate::ConnectionError::CircuitOpen)
    /// while the breaker is open.
    pub async fn connect(&self) -> ConnectionResult<T::Handle> {
        self.inner.acquire(false).await
    }

    /// Replace the cached connection even if it looks healthy.
    ///
    /// The breaker still applies: an open breaker rejects forced attempts too.
    pub async fn force_reconnect(&self) -> ConnectionResult<T::Handle> {
        tracing::info!("Forced reconnect requested");
        self.inner.acquire(true).await
    }

    /// True if a cached connection is ready and the breaker is closed.
    pub fn is_healthy(&self) -> bool {
        let flow = self.inner.lock_flow();
        !flow.closed && !self.inner.breaker.is_open() && flow.usable(&self.inner.health).is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_flow().state
    }

    /// Note that application work just used the connection.
    pub fn record_activity(&self) {
        self.inner.activity.record_activity();
    }

    /// Zero the health probe counters.
    pub fn reset_health_stats(&self) {
        self.inner.health.reset_stats();
    }

    /// Run one health probe cycle now, outside the schedule.
    pub async fn probe_now(&self) -> ProbeOutcome {
        self.inner.health.probe_once(&*self.inner).await
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    /// Read-only snapshot of connection, health, breaker and activity state.
    pub fn stats(&self) -> ManagerStats {
        let now = Instant::now();
        let connection = {
            let flow = self.inner.lock_flow();
            ConnectionSnapshot {
                state: flow.state,
                connection_id: flow.handle.as_ref().map(|h| h.id()),
                ready: flow.handle.as_ref().is_some_and(|h| h.is_ready()),
                attempt_in_flight: flow.in_flight.is_some(),
                attempts: flow.attempts,
                health_monitor_running: self.inner.health.is_running(),
            }
        };
        ManagerStats {
            connection,
            health: self.inner.health.snapshot(now),
            circuit_breaker: self.inner.breaker.snapshot(now),
            activity: self.inner.activity.snapshot(now),
        }
    }

    /// Stop probing, close the connection and refuse further connects.
    ///
    /// Safe to call any number of times, concurrently or in sequence.
    pub async fn shutdown(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .shutdown
            .run_once(|| async move { inner.teardown().await })
            .await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_complete()
    }
}

impl<T: Transport> Inner<T> {
    async fn teardown(&self) {
        tracing::info!("Shutting down connection manager");
        self.shutdown.trigger();
        self.lock_flow().closed = true;

        if let Some(task) = self.health.take_task() {
            let grace = self.config.health.probe_timeout() + PROBE_JOIN_GRACE;
            let abort = task.abort_handle();
            if tokio::time::timeout(grace, task).await.is_err() {
                tracing::warn!("Health monitor did not stop in time, aborting it");
                abort.abort();
            }
        }

        let listener = self.listener.lock().expect("listener mutex poisoned").take();
        if let Some(listener) = listener {
            listener.abort();
        }

        let handle = {
            let mut flow = self.lock_flow();
            let handle = flow.handle.take();
            if handle.is_some() {
                flow.state = ConnectionState::Disconnecting;
            }
            handle
        };
        if let Some(handle) = handle {
            tracing::info!(connection_id = %handle.id(), "Closing database connection");
            if let Err(e) = handle.close().await {
                tracing::warn!(error = %e, "Error closing database connection during shutdown");
            }
        }

        self.lock_flow().state = ConnectionState::Disconnected;
        tracing::info!("Connection manager shut down");
    }
}

impl<T: Transport> ProbeTarget for Inner<T> {
    type Handle = T::Handle;

    fn probe_candidate(&self) -> Result<T::Handle, SkipReason> {
        let flow = self.lock_flow();
        if self.breaker.is_open() {
            return Err(SkipReason::CircuitOpen);
        }
        match &flow.handle {
            Some(handle) if flow.state == ConnectionState::Connected && handle.is_ready() => Ok(handle.clone()),
            _ => Err(SkipReason::NotConnected),
        }
    }

    fn degrade(&self, id: ConnectionId) -> Option<T::Handle> {
        let mut flow = self.lock_flow();
        if !flow.handle.as_ref().is_some_and(|h| h.id() == id) {
            return None;
        }
        self.breaker.trip(Instant::now());
        flow.state = ConnectionState::Disconnected;
        flow.handle.take()
    }

    fn activity(&self) -> &ActivityClock {
        &self.activity
    }

    fn health(&self) -> &HealthMonitor {
        &self.health
    }
}

impl<T: Transport> EventSink for Inner<T> {
    fn on_transport_event(&self, event: &TransportEvent) {
        if event.kind == TransportEventKind::Connected {
            tracing::debug!(connection_id = %event.connection_id, "Transport reported connected");
            return;
        }

        let mut flow = self.lock_flow();
        let current = flow
            .handle
            .as_ref()
            .is_some_and(|h| h.id() == event.connection_id);
        if !current {
            tracing::debug!(
                connection_id = %event.connection_id,
                kind = ?event.kind,
                "Ignoring event for a connection that is no longer cached"
            );
            return;
        }

        flow.handle = None;
        flow.state = ConnectionState::Disconnected;
        if event.kind == TransportEventKind::Error {
            self.breaker.trip(Instant::now());
            tracing::warn!(
                connection_id = %event.connection_id,
                error = event.detail.as_deref().unwrap_or("unknown"),
                "Transport error, dropping cached connection and tripping breaker"
            );
        } else {
            tracing::warn!(
                connection_id = %event.connection_id,
                "Transport disconnected, dropping cached connection"
            );
        }
    }
}
