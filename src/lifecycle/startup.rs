//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from a validated configuration
//! - Build the connection manager over the HTTP transport
//! - Attempt an eager first connection (failure is logged, not fatal)
//! - Serve the admin router until a termination signal arrives
//!
//! # Design Decisions
//! - Fail fast on listener errors; a database outage is not a startup error
//! - The admin listener starts last and stops before the manager is torn down

use std::io;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::config::ConnectorConfig;
use crate::lifecycle::signals::wait_for_termination;
use crate::manager::ConnectionManager;
use crate::observability::{logging, metrics};
use crate::transport::HttpTransport;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind admin listener on {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("admin server error: {0}")]
    Serve(io::Error),
}

/// Run the service until SIGINT/SIGTERM, then shut the manager down.
pub async fn run(config: ConnectorConfig) -> Result<(), StartupError> {
    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "alumni-connector starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        max_pool_size = config.database.max_pool_size,
        connect_timeout_ms = config.database.connect_timeout_ms,
        breaker_threshold = config.circuit_breaker.threshold,
        breaker_cooldown_ms = config.circuit_breaker.cooldown_ms,
        probe_interval_ms = config.health.probe_interval_ms,
        "Configuration loaded"
    );

    let admin = config.admin.clone();
    let manager = ConnectionManager::new(config, HttpTransport::new());

    match manager.connect().await {
        Ok(_) => tracing::info!("Initial database connection established"),
        Err(e) => tracing::warn!(error = %e, "Initial database connection failed, will retry on demand"),
    }

    let served = if admin.enabled {
        let listener = TcpListener::bind(&admin.bind_address)
            .await
            .map_err(|source| StartupError::Bind {
                address: admin.bind_address.clone(),
                source,
            })?;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Admin API listening");
        }
        let app = setup_admin_router(manager.clone(), &admin.api_key);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let signal = wait_for_termination().await;
                tracing::info!(signal, "Termination signal received");
            })
            .await
            .map_err(StartupError::Serve)
    } else {
        let signal = wait_for_termination().await;
        tracing::info!(signal, "Termination signal received");
        Ok(())
    };

    manager.shutdown().await;
    tracing::info!("Shutdown complete");
    served
}
