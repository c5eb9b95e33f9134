//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! connect():
//!     → circuit_breaker.rs (admit, or fail fast with the remaining cooldown)
//!     → timeouts.rs (bound the transport connect)
//!     → circuit_breaker.rs (record success / failure)
//!
//! health probe:
//!     → timeouts.rs (bound the ping round trip)
//!     → circuit_breaker.rs (trip after repeated probe failures)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every transport call has a deadline
//! - Retries happen only through new connect() calls, never inside the transport
//! - The breaker does not care why a failure happened

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState};
