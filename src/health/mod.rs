//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Timer (after previous probe finished)
//!     → activity.rs (skip if idle)
//!     → ping the cached connection
//!     → state.rs (accumulate stats)
//!     → trip breaker after N consecutive failures
//!
//! Passive health checks (passive.rs):
//!     Transport Disconnected / Error event
//!     → manager drops the cached connection
//! ```
//!
//! # Design Decisions
//! - Liveness is inferred from probe outcomes, not only transport callbacks
//! - Idle services do not spend the scarce connection budget on probes
//! - Probe failures are internal; callers only see the breaker's effect

pub mod active;
pub mod activity;
pub mod passive;
pub mod state;

pub use active::{HealthMonitor, ProbeFailure, ProbeOutcome};
pub use activity::{ActivityClock, ActivitySnapshot};
pub use state::{HealthSnapshot, HealthStats};

use crate::transport::{ConnectionId, TransportHandle};

/// Why a probe cycle did not ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No cached, ready connection.
    NotConnected,
    /// The breaker is open or a trial is running.
    CircuitOpen,
    /// No activity within the activity window.
    Idle,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotConnected => "not_connected",
            SkipReason::CircuitOpen => "circuit_open",
            SkipReason::Idle => "idle",
        }
    }
}

/// What the health monitor needs from the component owning the connection.
pub trait ProbeTarget: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// The connection to probe, if probing is currently allowed.
    fn probe_candidate(&self) -> Result<Self::Handle, SkipReason>;

    /// Trip the breaker and drop the cached connection if it is still `id`.
    ///
    /// Returns the dropped handle so the caller can close it.
    fn degrade(&self, id: ConnectionId) -> Option<Self::Handle>;

    fn activity(&self) -> &ActivityClock;

    fn health(&self) -> &HealthMonitor;
}
