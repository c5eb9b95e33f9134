//! Read-only manager snapshot.

use serde::Serialize;

use crate::health::{ActivitySnapshot, HealthSnapshot};
use crate::resilience::BreakerSnapshot;
use crate::transport::{ConnectionId, ConnectionState};

/// Connection part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub connection_id: Option<ConnectionId>,
    /// Transport readiness of the cached handle.
    pub ready: bool,
    pub attempt_in_flight: bool,
    /// Transport attempts started since construction.
    pub attempts: u64,
    pub health_monitor_running: bool,
}

/// Everything `stats()` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub connection: ConnectionSnapshot,
    pub health: HealthSnapshot,
    pub circuit_breaker: BreakerSnapshot,
    pub activity: ActivitySnapshot,
}
