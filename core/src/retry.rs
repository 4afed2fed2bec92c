//! Waiting out rate limits.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::error::ApiError;

/// Longest wait, in seconds, the policy accepts before giving up.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;

/// Retries a call after a 429 once its first rate-limit window resets.
///
/// If that window resets more than `max_wait_secs` from now, or the error
/// carries no window, the error is returned as is. Every other error is
/// returned immediately.
#[derive(Clone)]
pub struct RetryPolicy {
    max_wait_secs: u64,
    clock: Arc<dyn Clock>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_wait_secs", &self.max_wait_secs)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            max_wait_secs: DEFAULT_MAX_WAIT_SECS,
            clock,
        }
    }

    pub fn with_max_wait(mut self, seconds: u64) -> Self {
        self.max_wait_secs = seconds;
        self
    }

    pub fn max_wait_secs(&self) -> u64 {
        self.max_wait_secs
    }

    /// Run `call` until it succeeds or fails with something not worth waiting for.
    pub fn with_retry<T, F>(&self, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Result<T, ApiError>,
    {
        loop {
            let err = match call() {
                Ok(value) => return Ok(value),
                Err(err @ ApiError::RateLimited { .. }) => err,
                Err(err) => return Err(err),
            };

            let Some(window) = err.rate_limits().first() else {
                warn!("rate limited without rate-limit headers, not retrying");
                return Err(err);
            };

            let wait = window.reset_in_seconds(self.clock.now());
            if wait > self.max_wait_secs {
                warn!(
                    wait_secs = wait,
                    max_wait_secs = self.max_wait_secs,
                    "rate limit resets too far out, giving up"
                );
                return Err(err);
            }

            warn!(wait_secs = wait, %window, "rate limited, waiting for reset");
            self.clock.sleep(Duration::from_secs(wait));
        }
    }
}
