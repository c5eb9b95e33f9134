//! Connection acquisition.
//!
//! # Responsibilities
//! - Hand out the cached connection while it is usable
//! - Coalesce concurrent callers onto a single in-flight attempt
//! - Charge connect outcomes to the circuit breaker
//! - Register transport listeners and start the health monitor once
//!
//! # Ordering
//! On failure the cached handle is cleared and the breaker charged before the
//! in-flight marker is released, so the next caller never sees a handle that
//! is about to be invalidated.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, MutexGuard};
use tokio::time::Instant;

use super::Inner;
use crate::error::{ConnectionError, ConnectionResult};
use crate::health::{passive, HealthMonitor};
use crate::observability::metrics;
use crate::resilience::timeouts::{self, Bounded};
use crate::resilience::Admission;
use crate::transport::{ConnectionState, Transport, TransportError, TransportHandle};

/// Outcome shared by every caller of one attempt.
pub(crate) type PendingConnect<H> = Shared<BoxFuture<'static, ConnectionResult<H>>>;

/// State owned by the connect flow.
pub(crate) struct FlowState<H> {
    pub(crate) state: ConnectionState,
    pub(crate) handle: Option<H>,
    pub(crate) in_flight: Option<PendingConnect<H>>,
    pub(crate) listeners_registered: bool,
    /// Set by shutdown; no new attempts afterwards.
    pub(crate) closed: bool,
    /// Transport attempts started so far.
    pub(crate) attempts: u64,
}

impl<H: TransportHandle> FlowState<H> {
    pub(crate) fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handle: None,
            in_flight: None,
            listeners_registered: false,
            closed: false,
            attempts: 0,
        }
    }

    /// The cached handle, if the transport says it is ready and no probe trip is pending.
    pub(crate) fn usable(&self, health: &HealthMonitor) -> Option<H> {
        let handle = self.handle.as_ref()?;
        let usable = self.state == ConnectionState::Connected && handle.is_ready() && !health.trip_pending();
        usable.then(|| handle.clone())
    }
}

enum Admitted<H> {
    Ready(H),
    Pending(PendingConnect<H>),
}

impl<T: Transport> Inner<T> {
    pub(crate) fn lock_flow(&self) -> MutexGuard<'_, FlowState<T::Handle>> {
        self.flow.lock().expect("connection flow mutex poisoned")
    }

    /// Acquire a connection. `force` skips the cache but not the breaker.
    pub(crate) async fn acquire(self: &Arc<Self>, force: bool) -> ConnectionResult<T::Handle> {
        match self.admit(force)? {
            Admitted::Ready(handle) => Ok(handle),
            Admitted::Pending(pending) => pending.await,
        }
    }

    fn admit(self: &Arc<Self>, force: bool) -> ConnectionResult<Admitted<T::Handle>> {
        let mut flow = self.lock_flow();
        if flow.closed {
            return Err(ConnectionError::ShutDown);
        }

        let now = Instant::now();
        let admission = match self.breaker.admit(now) {
            Ok(admission) => admission,
            Err(remaining) => {
                let retry_after_ms = (remaining.as_millis() as u64).max(1);
                metrics::record_circuit_rejection();
                tracing::debug!(retry_after_ms, force, "Connect rejected, circuit breaker open");
                return Err(ConnectionError::CircuitOpen { retry_after_ms });
            }
        };

        match admission {
            Admission::Closed => {
                if !force {
                    if let Some(handle) = flow.usable(&self.health) {
                        self.activity.record_at(now);
                        return Ok(Admitted::Ready(handle));
                    }
                }
                if let Some(pending) = flow.in_flight.clone() {
                    tracing::trace!("Joining in-flight connection attempt");
                    return Ok(Admitted::Pending(pending));
                }
                Ok(Admitted::Pending(self.start_attempt(&mut flow, false)))
            }
            Admission::Trial => match flow.in_flight.clone() {
                Some(pending) => Ok(Admitted::Pending(pending)),
                None => Ok(Admitted::Pending(self.start_attempt(&mut flow, true))),
            },
            // Exactly one trial: everyone else rides on it.
            Admission::TrialPending => match flow.in_flight.clone() {
                Some(pending) => Ok(Admitted::Pending(pending)),
                None => Err(ConnectionError::CircuitOpen { retry_after_ms: 1 }),
            },
        }
    }

    /// Spawn a new attempt and publish it as the in-flight one.
    ///
    /// The attempt runs as its own task so its bookkeeping completes even if
    /// every caller goes away.
    fn start_attempt(
        self: &Arc<Self>,
        flow: &mut FlowState<T::Handle>,
        trial: bool,
    ) -> PendingConnect<T::Handle> {
        let stale = flow.handle.take();
        flow.state = ConnectionState::Connecting;
        flow.attempts += 1;
        let attempt = flow.attempts;

        tracing::info!(attempt, trial, "Opening database connection");

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let run = Arc::clone(&inner).run_attempt(stale, attempt, trial);
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Release the in-flight marker and charge the breaker like any failure.
                    let err = ConnectionError::Transport(TransportError::Network(
                        "connect attempt panicked".to_string(),
                    ));
                    inner.on_connect_failed(&err, attempt, trial, 0);
                    Err(err)
                }
            }
        });
        let pending = async move {
            task.await.unwrap_or_else(|e| {
                Err(ConnectionError::Transport(TransportError::Network(format!(
                    "connect task failed: {}",
                    e
                ))))
            })
        }
        .boxed()
        .shared();

        flow.in_flight = Some(pending.clone());
        pending
    }

    async fn run_attempt(
        self: Arc<Self>,
        stale: Option<T::Handle>,
        attempt: u64,
        trial: bool,
    ) -> ConnectionResult<T::Handle> {
        if let Some(stale) = stale {
            tracing::debug!(connection_id = %stale.id(), "Discarding previous connection");
            if let Err(e) = stale.close().await {
                tracing::debug!(error = %e, "Closing previous connection failed");
            }
        }

        let db = &self.config.database;
        let options = db.connect_options();
        let started = Instant::now();
        let outcome = match timeouts::within(db.connect_timeout(), self.transport.connect(&db.uri, &options)).await {
            Ok(handle) => Ok(handle),
            Err(Bounded::Elapsed(deadline)) => Err(ConnectionError::ConnectTimeout {
                timeout_ms: deadline.as_millis() as u64,
            }),
            Err(Bounded::Failed(e)) => Err(ConnectionError::Transport(e)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(handle) => self.on_connected(handle, attempt, trial, elapsed_ms).await,
            Err(err) => {
                self.on_connect_failed(&err, attempt, trial, elapsed_ms);
                Err(err)
            }
        }
    }

    async fn on_connected(
        self: &Arc<Self>,
        handle: T::Handle,
        attempt: u64,
        trial: bool,
        elapsed_ms: u64,
    ) -> ConnectionResult<T::Handle> {
        let accepted = {
            let mut flow = self.lock_flow();
            flow.in_flight = None;
            if flow.closed {
                flow.state = ConnectionState::Disconnected;
                false
            } else {
                flow.handle = Some(handle.clone());
                flow.state = ConnectionState::Connected;
                self.breaker.record_success();
                self.health.record_connected();
                true
            }
        };

        if !accepted {
            tracing::info!(connection_id = %handle.id(), "Connection completed after shutdown, closing it");
            if let Err(e) = handle.close().await {
                tracing::debug!(error = %e, "Closing late connection failed");
            }
            return Err(ConnectionError::ShutDown);
        }

        self.activity.record_activity();
        metrics::record_connect_attempt("success");
        tracing::info!(
            connection_id = %handle.id(),
            attempt,
            trial,
            elapsed_ms,
            "Database connection established"
        );

        self.register_listeners();
        if self.health.start(Arc::downgrade(self), self.shutdown.subscribe()) {
            tracing::debug!("Health monitor task spawned");
        }

        // Shutdown may have taken and closed the handle since it was cached.
        if self.lock_flow().closed {
            return Err(ConnectionError::ShutDown);
        }
        Ok(handle)
    }

    fn on_connect_failed(&self, err: &ConnectionError, attempt: u64, trial: bool, elapsed_ms: u64) {
        let opened = {
            let mut flow = self.lock_flow();
            flow.handle = None;
            flow.state = ConnectionState::Disconnected;
            let opened = self.breaker.record_failure(Instant::now());
            flow.in_flight = None;
            opened
        };

        let outcome = match err {
            ConnectionError::ConnectTimeout { .. } => "timeout",
            _ => "failure",
        };
        metrics::record_connect_attempt(outcome);
        tracing::warn!(
            attempt,
            trial,
            elapsed_ms,
            error = %err,
            failure_count = self.breaker.failure_count(),
            breaker_opened = opened,
            "Database connection attempt failed"
        );
    }

    /// Subscribe to transport events exactly once per manager.
    fn register_listeners(self: &Arc<Self>) {
        {
            let mut flow = self.lock_flow();
            if flow.listeners_registered || flow.closed {
                return;
            }
            flow.listeners_registered = true;
        }

        let task = passive::spawn_listener(Arc::downgrade(self), self.transport.events());
        let mut slot = self.listener.lock().expect("listener mutex poisoned");
        if self.lock_flow().closed {
            // Teardown already ran its listener step.
            task.abort();
            return;
        }
        *slot = Some(task);
        tracing::debug!("Transport event listener registered");
    }
}
