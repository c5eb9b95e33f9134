//! Activity clock.
//!
//! Records when the connection last did useful work so the health monitor can
//! stay quiet while the service is idle.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Read-only activity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySnapshot {
    /// Milliseconds since the last recorded activity, if any.
    pub last_activity_ms_ago: Option<u64>,
}

/// Timestamp of the most recent useful operation.
#[derive(Debug, Default)]
pub struct ActivityClock {
    last: Mutex<Option<Instant>>,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark "now" as the latest activity.
    pub fn record_activity(&self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&self, at: Instant) {
        let mut last = self.last.lock().expect("activity clock mutex poisoned");
        // Never move backwards.
        if last.map_or(true, |prev| at > prev) {
            *last = Some(at);
        }
    }

    pub fn last_activity(&self) -> Option<Instant> {
        *self.last.lock().expect("activity clock mutex poisoned")
    }

    /// True if activity was recorded less than `window` ago.
    pub fn is_recently_active(&self, window: Duration) -> bool {
        self.is_recently_active_at(window, Instant::now())
    }

    pub fn is_recently_active_at(&self, window: Duration, now: Instant) -> bool {
        match self.last_activity() {
            Some(last) => now.saturating_duration_since(last) < window,
            None => false,
        }
    }

    pub fn snapshot(&self, now: Instant) -> ActivitySnapshot {
        ActivitySnapshot {
            last_activity_ms_ago: self
                .last_activity()
                .map(|last| now.saturating_duration_since(last).as_millis() as u64),
        }
    }
}
