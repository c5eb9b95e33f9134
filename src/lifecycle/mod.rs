//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Manager → Eager connect → Admin listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop probing → Stop event listener → Close connection
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the manager, then listeners
//! - Teardown runs at most once no matter how many callers ask for it
//! - A stuck probe is aborted after its timeout plus a grace second

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
