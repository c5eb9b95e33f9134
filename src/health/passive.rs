//! Passive failure detection from transport events.
//!
//! # Responsibilities
//! - Subscribe to the transport's lifecycle events once
//! - Forward each event to the manager, which decides what it invalidates
//!
//! # Design Decisions
//! - Events for connections other than the cached one are ignored downstream
//! - A lagging listener logs and keeps going; it never blocks the transport

use std::sync::Weak;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::transport::TransportEvent;

/// Receiver of transport lifecycle events.
pub trait EventSink: Send + Sync + 'static {
    fn on_transport_event(&self, event: &TransportEvent);
}

/// Spawn the listener task. It ends when the transport or the sink goes away.
pub fn spawn_listener<S: EventSink>(
    sink: Weak<S>,
    mut events: broadcast::Receiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(sink) = sink.upgrade() else {
                        break;
                    };
                    sink.on_transport_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Transport event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Transport event listener stopped");
    })
}
