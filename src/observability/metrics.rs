//! Metrics collection and exposition.
//!
//! # Metrics
//! - `connector_connect_attempts_total` (counter): transport attempts by outcome
//! - `connector_circuit_rejections_total` (counter): connect() calls failed fast
//! - `connector_breaker_open` (gauge): 1=open, 0=closed
//! - `connector_probes_total` (counter): executed probes by outcome
//! - `connector_probe_duration_seconds` (histogram): ping round trip
//! - `connector_probes_skipped_total` (counter): skipped probes by reason
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are low-cardinality static strings

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connect_attempt(outcome: &'static str) {
    counter!("connector_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_circuit_rejection() {
    counter!("connector_circuit_rejections_total").increment(1);
}

pub fn record_breaker_open(open: bool) {
    gauge!("connector_breaker_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_probe(success: bool, latency: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!("connector_probes_total", "outcome" => outcome).increment(1);
    histogram!("connector_probe_duration_seconds").record(latency.as_secs_f64());
}

pub fn record_probe_skipped(reason: &'static str) {
    counter!("connector_probes_skipped_total", "reason" => reason).increment(1);
}
