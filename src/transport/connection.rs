//! Connection identity and lifecycle state.
//!
//! # Responsibilities
//! - Give every transport connection a process-unique id for tracing
//! - Model the manager-level connection state machine
//! - Carry transport events tagged with the connection they concern

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one established transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Manager-level connection state.
///
/// ```text
/// Disconnected → Connecting → Connected
/// Connecting   → Disconnected        (timeout / failure)
/// Connected    → Disconnected        (probe trip / transport error event)
/// Connected    → Disconnecting → Disconnected   (shutdown)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No usable connection.
    Disconnected,
    /// An attempt is in flight.
    Connecting,
    /// A handle is cached and believed healthy.
    Connected,
    /// Shutdown is closing the cached handle.
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of lifecycle event a transport reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEventKind {
    Connected,
    Disconnected,
    Error,
}

/// A lifecycle event emitted by a transport for one of its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection_id: ConnectionId,
    pub kind: TransportEventKind,
    /// Human-readable detail, present for errors.
    pub detail: Option<String>,
}

impl TransportEvent {
    pub fn connected(connection_id: ConnectionId) -> Self {
        Self { connection_id, kind: TransportEventKind::Connected, detail: None }
    }

    pub fn disconnected(connection_id: ConnectionId) -> Self {
        Self { connection_id, kind: TransportEventKind::Disconnected, detail: None }
    }

    pub fn error(connection_id: ConnectionId, detail: impl Into<String>) -> Self {
        Self {
            connection_id,
            kind: TransportEventKind::Error,
            detail: Some(detail.into()),
        }
    }
}
