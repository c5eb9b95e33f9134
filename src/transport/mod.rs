//! Database transport subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectFlow
//!     → Transport::connect(uri, options)   (one pooled connection per attempt)
//!     → TransportHandle (cached by the manager)
//!         → run_admin_command({"ping": 1})  (health probes)
//!         → close()                         (reconnect / shutdown)
//!
//! Transport::events()
//!     → Connected / Disconnected / Error, tagged with the ConnectionId
//!     → consumed by the manager's event listener
//! ```
//!
//! # Design Decisions
//! - The manager owns retries; transports never retry on their own
//! - Events are a subscription on the transport, not callbacks on the handle
//! - Handles are cheap clones of a shared connection

pub mod connection;
pub mod http;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

pub use connection::{ConnectionId, ConnectionState, TransportEvent, TransportEventKind};
pub use http::{HttpHandle, HttpTransport};

/// Errors reported by a transport.
///
/// `Clone` so a single failed attempt can be handed to every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection string could not be used.
    #[error("invalid connection uri: {0}")]
    InvalidUri(String),

    /// Network-level failure (refused, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered but rejected the command.
    #[error("command rejected: {0}")]
    Command(String),

    /// A socket-level deadline elapsed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The handle has been closed.
    #[error("connection closed")]
    Closed,
}

/// Options applied to every new transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound on pooled sockets.
    pub max_pool_size: usize,
    /// Sockets kept warm when idle. Zero for the shared tier.
    pub min_pool_size: usize,
    /// Deadline for establishing the connection.
    pub connect_timeout: Duration,
    /// Deadline for a single command round trip.
    pub socket_timeout: Duration,
    /// Idle sockets are released after this long.
    pub max_idle_time: Duration,
    /// Let the client resend a request whose connection closed before it was written.
    /// The manager keeps this off and retries through its own connect flow.
    pub retry_writes: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_pool_size: 2,
            min_pool_size: 0,
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(45),
            max_idle_time: Duration::from_secs(30),
            retry_writes: false,
        }
    }
}

/// A factory for connections to the data store.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// Open a new connection.
    async fn connect(&self, uri: &str, options: &ConnectOptions) -> Result<Self::Handle, TransportError>;

    /// Subscribe to lifecycle events for connections created by this transport.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}

/// An established connection.
#[async_trait]
pub trait TransportHandle: Clone + Send + Sync + 'static {
    /// Identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Whether the transport considers the connection usable.
    fn is_ready(&self) -> bool;

    /// Run an administrative command and return the server's reply.
    async fn run_admin_command(&self, command: serde_json::Value) -> Result<serde_json::Value, TransportError>;

    /// Release the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), TransportError>;
}
