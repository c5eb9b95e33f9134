//! Failure injection tests for the connection manager.
//!
//! Time-dependent cases run on paused Tokio time, so cooldowns and probe
//! timeouts elapse instantly and deterministically.

use std::time::Duration;

use alumni_connector::health::ProbeFailure;
use alumni_connector::{
    CircuitState, ConnectionError, ConnectionManager, ConnectionState, ProbeOutcome, SkipReason,
    TransportError, TransportEvent, TransportHandle,
};

mod common;

use common::{settle, test_config, ConnectStep, MockTransport, PingMode};

fn manager() -> (ConnectionManager<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    (ConnectionManager::new(test_config(), transport.clone()), transport)
}

async fn trip_breaker(manager: &ConnectionManager<MockTransport>, transport: &MockTransport) {
    transport.script(&[ConnectStep::Fail; 5]);
    for _ in 0..5 {
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Transport(TransportError::Network(_))));
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_threshold_and_fails_fast() {
    let (manager, transport) = manager();
    trip_breaker(&manager, &transport).await;
    assert_eq!(transport.connects(), 5);

    let err = manager.connect().await.unwrap_err();
    assert!(err.is_circuit_open());
    // No transport call while open.
    assert_eq!(transport.connects(), 5);

    let stats = manager.stats();
    assert_eq!(stats.circuit_breaker.state, CircuitState::Open);
    assert_eq!(stats.circuit_breaker.failure_count, 5);
    assert_eq!(stats.connection.state, ConnectionState::Disconnected);
    assert!(!manager.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_then_single_trial() {
    let (manager, transport) = manager();
    trip_breaker(&manager, &transport).await;

    tokio::time::advance(Duration::from_secs(10)).await;
    match manager.connect().await {
        Err(ConnectionError::CircuitOpen { retry_after_ms }) => {
            assert!((19_000..=20_000).contains(&retry_after_ms), "retry_after_ms = {}", retry_after_ms);
        }
        other => panic!("expected CircuitOpen, got {:?}", other.map(|h| h.id())),
    }
    assert_eq!(transport.connects(), 5);

    tokio::time::advance(Duration::from_secs(21)).await;
    transport.set_connect_delay(Duration::from_millis(200));

    let (a, b, c) = tokio::join!(manager.connect(), manager.connect(), manager.connect());
    let a = a.unwrap();
    assert_eq!(b.unwrap().id(), a.id());
    assert_eq!(c.unwrap().id(), a.id());
    assert_eq!(transport.connects(), 6, "exactly one trial attempt");

    let stats = manager.stats();
    assert_eq!(stats.circuit_breaker.state, CircuitState::Closed);
    assert_eq!(stats.circuit_breaker.failure_count, 0);
    assert!(manager.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_restarts_cooldown() {
    let (manager, transport) = manager();
    trip_breaker(&manager, &transport).await;

    tokio::time::advance(Duration::from_secs(31)).await;
    transport.script(&[ConnectStep::Fail]);
    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Transport(_)));
    assert_eq!(transport.connects(), 6);

    match manager.connect().await {
        Err(ConnectionError::CircuitOpen { retry_after_ms }) => assert!((29_000..=30_000).contains(&retry_after_ms)),
        other => panic!("expected CircuitOpen, got {:?}", other.map(|h| h.id())),
    }

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(manager.connect().await.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(manager.connect().await.is_ok());
    assert_eq!(transport.connects(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_charged_and_releases_attempt() {
    let (manager, transport) = manager();
    transport.script(&[ConnectStep::Hang]);

    let err = manager.connect().await.unwrap_err();
    assert_eq!(err, ConnectionError::ConnectTimeout { timeout_ms: 10_000 });

    let stats = manager.stats();
    assert_eq!(stats.circuit_breaker.failure_count, 1);
    assert!(!stats.connection.attempt_in_flight);
    assert_eq!(stats.connection.state, ConnectionState::Disconnected);

    // The next call starts a fresh attempt instead of joining the dead one.
    assert!(manager.connect().await.is_ok());
    assert_eq!(transport.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_attempt_releases_in_flight_marker() {
    let (manager, transport) = manager();
    transport.script(&[ConnectStep::Panic]);

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Transport(TransportError::Network(_))));

    let stats = manager.stats();
    assert!(!stats.connection.attempt_in_flight);
    assert_eq!(stats.connection.state, ConnectionState::Disconnected);
    assert_eq!(stats.circuit_breaker.failure_count, 1);

    // The manager is not wedged: the next caller gets a fresh attempt.
    let handle = manager.connect().await.unwrap();
    assert_eq!(transport.connects(), 2);
    assert_eq!(manager.stats().connection.connection_id, Some(handle.id()));
    assert!(manager.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_idle_connection_is_not_probed() {
    let (manager, transport) = manager();
    manager.connect().await.unwrap();
    let handle = transport.last_handle();

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(manager.probe_now().await, ProbeOutcome::Skipped(SkipReason::Idle));
    assert_eq!(handle.pings(), 0);
    assert_eq!(manager.stats().health.skipped_idle, 1);

    manager.record_activity();
    assert!(matches!(manager.probe_now().await, ProbeOutcome::Healthy { .. }));
    assert_eq!(handle.pings(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_successful_probe_counts_as_activity() {
    let (manager, transport) = manager();
    manager.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(200)).await;
    assert!(matches!(manager.probe_now().await, ProbeOutcome::Healthy { .. }));
    assert_eq!(manager.stats().activity.last_activity_ms_ago, Some(0));

    // 200s after the probe is still inside the window measured from it.
    tokio::time::advance(Duration::from_secs(200)).await;
    assert!(matches!(manager.probe_now().await, ProbeOutcome::Healthy { .. }));
    assert_eq!(transport.last_handle().pings(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_silent_degradation_trips_breaker() {
    let (manager, transport) = manager();
    manager.connect().await.unwrap();
    let handle = transport.last_handle();
    // Transport still says ready; only pings reveal the problem.
    handle.set_ping(PingMode::Fail);

    for expected in 1..=2 {
        match manager.probe_now().await {
            ProbeOutcome::Failed { consecutive, failure } => {
                assert_eq!(consecutive, expected);
                assert!(matches!(failure, ProbeFailure::Transport(_)));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(manager.is_healthy());
    }

    assert!(matches!(
        manager.probe_now().await,
        ProbeOutcome::Tripped { consecutive: 3, .. }
    ));
    assert!(!manager.is_healthy());
    assert_eq!(handle.closes(), 1);

    let stats = manager.stats();
    assert_eq!(stats.circuit_breaker.state, CircuitState::Open);
    assert_eq!(stats.health.trips, 1);
    assert_eq!(stats.connection.state, ConnectionState::Disconnected);

    let connects = transport.connects();
    assert!(manager.connect().await.unwrap_err().is_circuit_open());
    assert_eq!(transport.connects(), connects);
    assert_eq!(manager.probe_now().await, ProbeOutcome::Skipped(SkipReason::CircuitOpen));
}

#[tokio::test(start_paused = true)]
async fn test_probe_timeout_and_rejection_count_as_failures() {
    let (manager, transport) = manager();
    manager.connect().await.unwrap();
    let handle = transport.last_handle();

    handle.set_ping(PingMode::Hang);
    match manager.probe_now().await {
        ProbeOutcome::Failed { failure, consecutive } => {
            assert_eq!(failure, ProbeFailure::Timeout(Duration::from_secs(5)));
            assert_eq!(consecutive, 1);
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    handle.set_ping(PingMode::Reject);
    match manager.probe_now().await {
        ProbeOutcome::Failed { failure, consecutive } => {
            assert_eq!(failure, ProbeFailure::Rejected("not primary".into()));
            assert_eq!(consecutive, 2);
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    handle.set_ping(PingMode::Ok);
    assert!(matches!(manager.probe_now().await, ProbeOutcome::Healthy { .. }));
    assert_eq!(manager.stats().health.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_loop_detects_degradation() {
    let mut config = test_config();
    config.health.enabled = true;
    config.health.probe_interval_ms = 1_000;
    let transport = MockTransport::new();
    let manager = ConnectionManager::new(config, transport.clone());

    manager.connect().await.unwrap();
    assert!(manager.stats().connection.health_monitor_running);
    transport.last_handle().set_ping(PingMode::Fail);

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let stats = manager.stats();
    assert_eq!(stats.health.trips, 1);
    assert_eq!(stats.circuit_breaker.state, CircuitState::Open);
    assert!(!manager.is_healthy());

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_event_invalidates_cache() {
    let (manager, transport) = manager();
    let first = manager.connect().await.unwrap();
    settle().await;

    transport.emit(TransportEvent::error(first.id(), "socket reset"));
    settle().await;

    let stats = manager.stats();
    assert_eq!(stats.connection.state, ConnectionState::Disconnected);
    assert_eq!(stats.connection.connection_id, None);
    assert_eq!(stats.circuit_breaker.state, CircuitState::Open);
    assert!(!manager.is_healthy());

    // One error event is enough to open the breaker.
    assert!(manager.connect().await.unwrap_err().is_circuit_open());
    assert_eq!(transport.connects(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    let second = manager.connect().await.unwrap();
    assert_ne!(second.id(), first.id());
    assert_eq!(transport.connects(), 2);
    assert_eq!(manager.stats().circuit_breaker.state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_event_does_not_charge_breaker() {
    let (manager, transport) = manager();
    let first = manager.connect().await.unwrap();
    settle().await;

    transport.emit(TransportEvent::disconnected(first.id()));
    settle().await;

    let stats = manager.stats();
    assert_eq!(stats.connection.connection_id, None);
    assert_eq!(stats.circuit_breaker.state, CircuitState::Closed);
    assert_eq!(stats.circuit_breaker.failure_count, 0);
    assert!(manager.connect().await.is_ok());
    assert_eq!(transport.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_events_for_other_connections_are_ignored() {
    let (manager, transport) = manager();
    let first = manager.connect().await.unwrap();
    settle().await;

    transport.emit(TransportEvent::disconnected(alumni_connector::ConnectionId::new()));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Connected);

    // Replacing the connection closes the old one; its event must not
    // invalidate the new cache entry.
    let second = manager.force_reconnect().await.unwrap();
    settle().await;
    assert_ne!(first.id(), second.id());
    assert_eq!(transport.handles()[0].closes(), 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(manager.is_healthy());
    assert_eq!(manager.stats().circuit_breaker.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_handle_is_replaced() {
    let (manager, transport) = manager();
    let first = manager.connect().await.unwrap();
    transport.last_handle().set_ready(false);
    assert!(!manager.is_healthy());

    let second = manager.connect().await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(transport.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_reconnect_respects_open_breaker() {
    let (manager, transport) = manager();
    trip_breaker(&manager, &transport).await;

    assert!(manager.force_reconnect().await.unwrap_err().is_circuit_open());
    assert_eq!(transport.connects(), 5);
}
