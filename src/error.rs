//! Errors surfaced by the connection manager.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::transport::TransportError;

/// Why `connect()` could not hand out a connection.
///
/// `Clone` because every caller coalesced onto one attempt receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The breaker is open; no transport call was made.
    #[error("circuit breaker open, retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    /// The attempt did not complete within the connect deadline.
    #[error("connect timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// The transport rejected or failed the attempt.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The manager has been shut down.
    #[error("connection manager is shut down")]
    ShutDown,
}

impl ConnectionError {
    /// Whether this error is a fail-fast rejection by the breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ConnectionError::CircuitOpen { .. })
    }

    /// Suggested wait before retrying, in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ConnectionError::CircuitOpen { retry_after_ms } => Some(*retry_after_ms),
            ConnectionError::ConnectTimeout { .. } | ConnectionError::Transport(_) => Some(1_000),
            ConnectionError::ShutDown => None,
        }
    }
}

/// Result type for manager operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Request handlers translate connection failures into "temporarily unavailable".
impl IntoResponse for ConnectionError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": "service temporarily unavailable",
            "detail": self.to_string(),
            "retry_after_ms": self.retry_after_ms(),
        }));
        let mut response = (StatusCode::SERVICE_UNAVAILABLE, body).into_response();

        if let Some(ms) = self.retry_after_ms() {
            let secs = ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = ConnectionError::CircuitOpen { retry_after_ms: 20_000 };
        assert_eq!(err.to_string(), "circuit breaker open, retry after 20000ms");

        let err = ConnectionError::from(TransportError::Timeout(Duration::from_secs(2)));
        assert!(err.to_string().starts_with("transport error: operation timed out"));
    }

    #[test]
    fn test_retry_hint() {
        assert_eq!(ConnectionError::CircuitOpen { retry_after_ms: 1500 }.retry_after_ms(), Some(1500));
        assert!(ConnectionError::CircuitOpen { retry_after_ms: 0 }.is_circuit_open());
        assert_eq!(ConnectionError::ShutDown.retry_after_ms(), None);
    }

    #[test]
    fn test_response_carries_retry_after() {
        let response = ConnectionError::CircuitOpen { retry_after_ms: 20_001 }.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "21");

        let response = ConnectionError::ShutDown.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
