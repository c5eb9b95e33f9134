use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use super::AdminState;
use crate::error::ConnectionError;
use crate::health::ProbeOutcome;
use crate::manager::ManagerStats;
use crate::transport::{ConnectionId, ConnectionState, Transport, TransportHandle};

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub healthy: bool,
    pub state: ConnectionState,
}

#[derive(Serialize)]
pub struct ReconnectResult {
    pub connection_id: ConnectionId,
    pub ready: bool,
}

pub async fn get_healthz<T: Transport>(
    State(state): State<AdminState<T>>,
) -> (StatusCode, Json<HealthStatus>) {
    let healthy = state.manager.is_healthy();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthStatus {
            version: env!("CARGO_PKG_VERSION"),
            healthy,
            state: state.manager.state(),
        }),
    )
}

pub async fn get_stats<T: Transport>(State(state): State<AdminState<T>>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

pub async fn post_reconnect<T: Transport>(
    State(state): State<AdminState<T>>,
) -> Result<Json<ReconnectResult>, ConnectionError> {
    let handle = state.manager.force_reconnect().await?;
    Ok(Json(ReconnectResult {
        connection_id: handle.id(),
        ready: handle.is_ready(),
    }))
}

pub async fn post_probe<T: Transport>(State(state): State<AdminState<T>>) -> Json<Value> {
    let outcome = state.manager.probe_now().await;
    let mut body = json!({ "outcome": outcome.as_str() });
    match &outcome {
        ProbeOutcome::Skipped(reason) => body["reason"] = json!(reason.as_str()),
        ProbeOutcome::Healthy { latency } => body["latency_ms"] = json!(latency.as_millis() as u64),
        ProbeOutcome::Failed { failure, consecutive } | ProbeOutcome::Tripped { failure, consecutive } => {
            body["error"] = json!(failure.to_string());
            body["consecutive_failures"] = json!(consecutive);
        }
    }
    Json(body)
}
