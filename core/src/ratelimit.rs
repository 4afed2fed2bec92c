//! Rate-limit windows parsed from response headers.
//!
//! The API reports every window in effect (per minute, per day, ...) as
//! comma-separated parallel arrays across four headers. Entry `i` of each
//! header describes window `i`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::http::find_header;

pub const PERIOD_HEADER: &str = "X-RateLimit-Period";
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// One rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimit {
    pub period_seconds: u64,
    pub request_limit: u64,
    pub requests_remaining: u64,
    /// Unix timestamp (seconds, UTC) at which the window resets.
    pub reset_timestamp: i64,
}

impl RateLimit {
    /// Parse every window from the rate-limit headers. Missing headers yield
    /// an empty list; malformed entries are skipped.
    pub fn from_headers(headers: &[(String, String)]) -> Vec<RateLimit> {
        let (Some(periods), Some(limits), Some(remaining), Some(resets)) = (
            find_header(headers, PERIOD_HEADER),
            find_header(headers, LIMIT_HEADER),
            find_header(headers, REMAINING_HEADER),
            find_header(headers, RESET_HEADER),
        ) else {
            return Vec::new();
        };

        let periods: Vec<&str> = periods.split(',').collect();
        let limits: Vec<&str> = limits.split(',').collect();
        let remaining: Vec<&str> = remaining.split(',').collect();
        let resets: Vec<&str> = resets.split(',').collect();

        let count = periods.len();
        if limits.len() != count || remaining.len() != count || resets.len() != count {
            warn!(
                periods = count,
                limits = limits.len(),
                remaining = remaining.len(),
                resets = resets.len(),
                "rate-limit headers have mismatched lengths"
            );
        }

        let mut windows = Vec::with_capacity(count);
        for (idx, period) in periods.iter().enumerate() {
            let parsed = (
                period.trim().parse::<u64>(),
                limits.get(idx).map(|v| v.trim().parse::<u64>()),
                remaining.get(idx).map(|v| v.trim().parse::<u64>()),
                resets.get(idx).map(|v| v.trim().parse::<i64>()),
            );
            match parsed {
                (
                    Ok(period_seconds),
                    Some(Ok(request_limit)),
                    Some(Ok(requests_remaining)),
                    Some(Ok(reset_timestamp)),
                ) => windows.push(RateLimit {
                    period_seconds,
                    request_limit,
                    requests_remaining,
                    reset_timestamp,
                }),
                _ => warn!(index = idx, "skipping malformed rate-limit window"),
            }
        }
        windows
    }

    /// Seconds to wait before the window resets: `max(reset - now, 0) + 1`.
    pub fn reset_in_seconds(&self, now: i64) -> u64 {
        self.reset_timestamp.saturating_sub(now).max(0) as u64 + 1
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset_timestamp, 0)
    }

    /// Period as text, e.g. `"1 Day"` or `"1 Hour 30 Minutes"`.
    pub fn readable_period(&self) -> String {
        readable_duration(self.period_seconds)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reset = self
            .reset_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.reset_timestamp.to_string());
        write!(
            f,
            "period: {}, limit: {}, remaining: {}, resets at: {reset} UTC",
            self.readable_period(),
            self.request_limit,
            self.requests_remaining
        )
    }
}

/// Whole days, hours and minutes in `seconds`, leftover seconds dropped.
pub fn readable_duration(seconds: u64) -> String {
    let total_minutes = seconds / 60;
    let minutes = total_minutes % 60;
    let total_hours = total_minutes / 60;
    let hours = total_hours % 24;
    let days = total_hours / 24;

    let mut parts = Vec::new();
    for (amount, singular, plural) in [
        (days, "Day", "Days"),
        (hours, "Hour", "Hours"),
        (minutes, "Minute", "Minutes"),
    ] {
        if amount > 0 {
            parts.push(format!("{amount} {}", if amount == 1 { singular } else { plural }));
        }
    }
    parts.join(" ")
}
