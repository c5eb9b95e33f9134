//! Shutdown coordination.

use std::future::Future;
use tokio::sync::{watch, OnceCell};

/// Coordinator for a once-only teardown.
///
/// Long-running tasks subscribe to a watch channel that flips to `true` when
/// shutdown starts. The teardown itself runs at most once; concurrent callers
/// wait for the first one to finish.
#[derive(Debug)]
pub struct Shutdown {
    /// Watch channel sender.
    tx: watch::Sender<bool>,
    /// Set once the teardown has completed.
    completed: OnceCell<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            completed: OnceCell::new(),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Raise the shutdown signal. Returns true only for the first call.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    /// Whether the teardown has finished.
    pub fn is_complete(&self) -> bool {
        self.completed.initialized()
    }

    /// Run `teardown` unless it already ran; callers arriving mid-teardown wait for it.
    pub async fn run_once<F, Fut>(&self, teardown: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.completed.get_or_init(teardown).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
