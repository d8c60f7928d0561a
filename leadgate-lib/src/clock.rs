//! Clock abstraction for the time-windowed checks.
//!
//! The rate limiter works in monotonic time (`Instant`), the duplicate guard
//! compares against persisted wall-clock creation stamps. Both come from one
//! trait so tests can drive window expiry deterministically instead of
//! sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic now, for rate-window arithmetic.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, for persisted creation stamps.
    fn unix_millis(&self) -> u64;
}

/// Production clock backed by `Instant::now()` and `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same underlying time value; monotonic and wall time
/// advance together, so a 24 h `advance` expires both rate windows and
/// dedup windows.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    unix_ms: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                unix_ms: 1_700_000_000_000,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += by;
        state.unix_ms += by.as_millis() as u64;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).now
    }

    fn unix_millis(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).unix_ms
    }
}
