//! Resilient single-connection database manager.
//!
//! A [`ConnectionManager`] keeps one pooled connection to the data store for
//! a service running on a shared database tier: it coalesces concurrent
//! connects, fails fast behind a circuit breaker, probes the connection only
//! while the service is active, and tears everything down exactly once.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use config::ConnectorConfig;
pub use error::{ConnectionError, ConnectionResult};
pub use health::{ProbeOutcome, SkipReason};
pub use lifecycle::Shutdown;
pub use manager::{ConnectionManager, ManagerStats};
pub use resilience::CircuitState;
pub use transport::{
    ConnectOptions, ConnectionId, ConnectionState, HttpTransport, Transport, TransportError, TransportEvent,
    TransportEventKind, TransportHandle,
};
