//! # Clock / Time Source
//!
//! The engine never calls `Utc::now()` directly. Components receive an
//! `Arc<dyn Clock>` so tests can pin and advance time deterministically.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;

use crate::temporal::Timestamp;

/// Source of the current point in time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant, UTC, seconds precision.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying instant, so a test can hold one handle
/// while the engine holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: Timestamp) {
        *self.current.lock() = at;
    }

    /// Move forward by `minutes`.
    pub fn advance_minutes(&self, minutes: i64) {
        let mut guard = self.current.lock();
        *guard = guard.plus_minutes(minutes);
    }

    /// Move forward by an arbitrary duration.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock();
        *guard = guard.plus(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
