//! Shared utilities for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use alumni_connector::config::ConnectorConfig;
use alumni_connector::{
    ConnectOptions, ConnectionId, Transport, TransportError, TransportEvent, TransportHandle,
};

/// What the next `connect` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    Succeed,
    Fail,
    /// Never completes; the manager's connect timeout must fire.
    Hang,
    /// Panics inside the connect future.
    Panic,
}

/// What `ping` does on a mock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMode {
    Ok,
    Fail,
    Reject,
    Hang,
}

struct MockState {
    events: broadcast::Sender<TransportEvent>,
    script: Mutex<VecDeque<ConnectStep>>,
    connect_delay: Mutex<Duration>,
    connects: AtomicU32,
    handles: Mutex<Vec<MockHandle>>,
}

/// Scripted transport. Clones share state, so tests keep one to inspect.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(MockState {
                events,
                script: Mutex::new(VecDeque::new()),
                connect_delay: Mutex::new(Duration::ZERO),
                connects: AtomicU32::new(0),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue outcomes for the next connects. Unscripted connects succeed.
    pub fn script(&self, steps: &[ConnectStep]) {
        self.state.script.lock().unwrap().extend(steps.iter().copied());
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    /// Number of times `connect` was called.
    pub fn connects(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Every handle handed out so far, oldest first.
    pub fn handles(&self) -> Vec<MockHandle> {
        self.state.handles.lock().unwrap().clone()
    }

    pub fn last_handle(&self) -> MockHandle {
        self.handles().pop().expect("no connection opened yet")
    }

    pub fn emit(&self, event: TransportEvent) {
        let _ = self.state.events.send(event);
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = MockHandle;

    async fn connect(&self, _uri: &str, _options: &ConnectOptions) -> Result<MockHandle, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectStep::Succeed);
        match step {
            ConnectStep::Succeed => {
                let handle = MockHandle::new(self.state.events.clone());
                self.state.handles.lock().unwrap().push(handle.clone());
                let _ = self.state.events.send(TransportEvent::connected(handle.id()));
                Ok(handle)
            }
            ConnectStep::Fail => Err(TransportError::Network("connection refused".into())),
            ConnectStep::Hang => std::future::pending().await,
            ConnectStep::Panic => panic!("scripted connect panic"),
        }
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.state.events.subscribe()
    }
}

struct HandleState {
    id: ConnectionId,
    ready: AtomicBool,
    ping: Mutex<PingMode>,
    pings: AtomicU32,
    closes: AtomicU32,
    closed: AtomicBool,
    events: broadcast::Sender<TransportEvent>,
}

#[derive(Clone)]
pub struct MockHandle {
    state: Arc<HandleState>,
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle").finish_non_exhaustive()
    }
}

impl MockHandle {
    fn new(events: broadcast::Sender<TransportEvent>) -> Self {
        Self {
            state: Arc::new(HandleState {
                id: ConnectionId::new(),
                ready: AtomicBool::new(true),
                ping: Mutex::new(PingMode::Ok),
                pings: AtomicU32::new(0),
                closes: AtomicU32::new(0),
                closed: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn set_ping(&self, mode: PingMode) {
        *self.state.ping.lock().unwrap() = mode;
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::SeqCst);
    }

    pub fn pings(&self) -> u32 {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Number of effective closes (at most one).
    pub fn closes(&self) -> u32 {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportHandle for MockHandle {
    fn id(&self) -> ConnectionId {
        self.state.id
    }

    fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn run_admin_command(&self, _command: Value) -> Result<Value, TransportError> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        let mode = *self.state.ping.lock().unwrap();
        match mode {
            PingMode::Ok => Ok(json!({ "ok": 1 })),
            PingMode::Fail => Err(TransportError::Network("no route to host".into())),
            PingMode::Reject => Err(TransportError::Command("not primary".into())),
            PingMode::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.ready.store(false, Ordering::SeqCst);
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            let _ = self.state.events.send(TransportEvent::disconnected(self.state.id));
        }
        Ok(())
    }
}

/// Defaults with the probe loop disabled; tests drive probes explicitly.
pub fn test_config() -> ConnectorConfig {
    let mut config = ConnectorConfig::default();
    config.database.uri = "http://db.test:27080".to_string();
    config.circuit_breaker.threshold = 5;
    config.circuit_breaker.cooldown_ms = 30_000;
    config.database.connect_timeout_ms = 10_000;
    config.health.enabled = false;
    config
}

/// Let spawned listeners drain pending events.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Reply the fake database gives to every admin command.
#[derive(Clone)]
pub struct FakeDatabase {
    reply: Arc<Mutex<(StatusCode, Value)>>,
    hits: Arc<AtomicU32>,
}

impl FakeDatabase {
    pub fn set_reply(&self, status: StatusCode, body: Value) {
        *self.reply.lock().unwrap() = (status, body);
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn admin_command(State(db): State<FakeDatabase>, Json(_command): Json<Value>) -> (StatusCode, Json<Value>) {
    db.hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = db.reply.lock().unwrap().clone();
    (status, Json(body))
}

/// Start an HTTP data API answering `{"ok": 1}` on an ephemeral port.
pub async fn start_fake_database() -> (SocketAddr, FakeDatabase) {
    let db = FakeDatabase {
        reply: Arc::new(Mutex::new((StatusCode::OK, json!({ "ok": 1 })))),
        hits: Arc::new(AtomicU32::new(0)),
    };
    let app = Router::new()
        .route("/admin/command", post(admin_command))
        .with_state(db.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, db)
}

/// An address nothing listens on.
pub async fn unused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
