//! Time source for request timestamps and rate-limit waits.

use std::time::Duration;

use chrono::Utc;

/// Supplies the current Unix time and blocks the calling thread.
///
/// Signing reads `now` for `AuthTimestamp`; `RetryPolicy` reads it to compute
/// reset windows and calls `sleep` while waiting one out. Tests substitute a
/// clock that records sleeps instead of performing them.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds, UTC.
    fn now(&self) -> i64;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono` and `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
