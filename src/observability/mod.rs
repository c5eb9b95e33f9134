//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectFlow / CircuitBreaker / HealthMonitor / Shutdown produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every state transition is logged with structured fields
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
