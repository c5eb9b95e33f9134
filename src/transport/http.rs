//! HTTP data-API transport.
//!
//! # Responsibilities
//! - Open a pooled hyper client sized for the shared database tier
//! - Handshake with a `{"hello": 1}` command before reporting success
//! - Run admin commands as `POST {uri}/admin/command` with a JSON body
//! - Report connection-level failures as transport events
//!
//! # Design Decisions
//! - `retry_writes` maps to hyper's canceled-request retry; the manager
//!   turns it off and decides when to retry itself
//! - A semaphore caps in-flight commands at `max_pool_size`
//! - Plain `http://` only; TLS terminates in front of the data API

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper::{body::Incoming, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::timeout;
use url::Url;

use super::{ConnectOptions, ConnectionId, Transport, TransportError, TransportEvent, TransportHandle};

/// Replies larger than this are treated as protocol errors.
const MAX_REPLY_BYTES: usize = 64 * 1024;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transport speaking to a document database's HTTP data API.
pub struct HttpTransport {
    events: broadcast::Sender<TransportEvent>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { events }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the admin command endpoint for a base uri.
fn command_endpoint(uri: &str) -> Result<Uri, TransportError> {
    let base = Url::parse(uri).map_err(|e| TransportError::InvalidUri(format!("{}: {}", uri, e)))?;
    if base.scheme() != "http" {
        return Err(TransportError::InvalidUri(format!(
            "unsupported scheme '{}', expected http",
            base.scheme()
        )));
    }
    let endpoint = format!("{}/admin/command", base.as_str().trim_end_matches('/'));
    endpoint
        .parse::<Uri>()
        .map_err(|e| TransportError::InvalidUri(e.to_string()))
}

/// True when a reply carries `ok: 1` (or `ok: true`).
fn reply_ok(reply: &Value) -> bool {
    match reply.get("ok") {
        Some(Value::Bool(ok)) => *ok,
        Some(v) => v.as_f64() == Some(1.0),
        None => false,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Handle = HttpHandle;

    async fn connect(&self, uri: &str, options: &ConnectOptions) -> Result<HttpHandle, TransportError> {
        let command_url = command_endpoint(uri)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(options.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(options.max_pool_size)
            .pool_idle_timeout(options.max_idle_time)
            .retry_canceled_requests(options.retry_writes)
            .build(connector);

        if options.min_pool_size > 0 {
            tracing::debug!(
                min_pool_size = options.min_pool_size,
                "HTTP transport keeps no warm sockets; min_pool_size ignored"
            );
        }

        let handle = HttpHandle {
            inner: Arc::new(HandleInner {
                id: ConnectionId::new(),
                client,
                command_url,
                socket_timeout: options.socket_timeout,
                ready: AtomicBool::new(true),
                permits: Semaphore::new(options.max_pool_size.max(1)),
                events: self.events.clone(),
            }),
        };

        if let Err(e) = handle.run_admin_command(json!({ "hello": 1 })).await {
            // Never announced, so no Disconnected event either.
            handle.inner.ready.store(false, Ordering::SeqCst);
            return Err(e);
        }

        tracing::debug!(connection_id = %handle.id(), uri = %uri, "HTTP transport connected");
        let _ = self.events.send(TransportEvent::connected(handle.id()));
        Ok(handle)
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

struct HandleInner {
    id: ConnectionId,
    client: Client<HttpConnector, Body>,
    command_url: Uri,
    socket_timeout: Duration,
    ready: AtomicBool,
    permits: Semaphore,
    events: broadcast::Sender<TransportEvent>,
}

/// Handle to a pooled HTTP data-API connection.
#[derive(Clone)]
pub struct HttpHandle {
    inner: Arc<HandleInner>,
}

impl HttpHandle {
    /// Mark the connection unusable after a connection-level failure.
    fn mark_broken(&self, err: &TransportError) {
        if self.inner.ready.swap(false, Ordering::SeqCst) {
            tracing::warn!(connection_id = %self.inner.id, error = %err, "HTTP transport connection broken");
            let _ = self.inner.events.send(TransportEvent::error(self.inner.id, err.to_string()));
        }
    }
}

impl std::fmt::Debug for HttpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandle")
            .field("id", &self.inner.id)
            .field("command_url", &self.inner.command_url)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[async_trait]
impl TransportHandle for HttpHandle {
    fn id(&self) -> ConnectionId {
        self.inner.id
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    async fn run_admin_command(&self, command: Value) -> Result<Value, TransportError> {
        if !self.is_ready() {
            return Err(TransportError::Closed);
        }
        let _permit = self.inner.permits.acquire().await.map_err(|_| TransportError::Closed)?;

        let body = serde_json::to_vec(&command).map_err(|e| TransportError::Command(e.to_string()))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.inner.command_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "alumni-connector")
            .body(Body::from(body))
            .map_err(|e| TransportError::InvalidUri(e.to_string()))?;

        let deadline = self.inner.socket_timeout;
        let response: Response<Incoming> = match timeout(deadline, self.inner.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = TransportError::Network(e.to_string());
                if e.is_connect() {
                    self.mark_broken(&err);
                }
                return Err(err);
            }
            Err(_) => return Err(TransportError::Timeout(deadline)),
        };

        let status = response.status();
        let bytes = match timeout(deadline, axum::body::to_bytes(Body::new(response.into_body()), MAX_REPLY_BYTES)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(TransportError::Network(e.to_string())),
            Err(_) => return Err(TransportError::Timeout(deadline)),
        };

        if !status.is_success() {
            return Err(TransportError::Command(format!("server answered {}", status)));
        }

        let reply: Value = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Command(format!("malformed reply: {}", e)))?;
        if !reply_ok(&reply) {
            let message = reply
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or("reply missing ok: 1")
                .to_string();
            return Err(TransportError::Command(message));
        }
        Ok(reply)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.inner.ready.swap(false, Ordering::SeqCst) {
            self.inner.permits.close();
            tracing::debug!(connection_id = %self.inner.id, "HTTP transport closed");
            let _ = self.inner.events.send(TransportEvent::disconnected(self.inner.id));
        }
        Ok(())
    }
}
