//! Per-session rolling-window rate limiter.
//!
//! Each session token keeps the monotonic timestamps of its recent requests;
//! entries older than the window are pruned on every check, so capacity
//! frees exactly as the window slides past each request. Checked before a
//! request is enqueued -- queue capacity and rate allowance are independent
//! limits.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default maximum requests per session per window.
const DEFAULT_MAX_PER_WINDOW: u32 = 20;

/// Default rolling window length.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rolling-window request counter, one window per session token.
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    /// Per-token request timestamps within the current window.
    requests: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with custom limits.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            requests: DashMap::new(),
        }
    }

    /// Check whether a request from `token` is allowed, recording it if so.
    ///
    /// Returns `false` when the token already has `max_per_window` requests
    /// inside the window; a rejected request is not recorded and does not
    /// extend the window.
    pub fn check(&self, token: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .requests
            .entry(token.to_string())
            .or_insert_with(VecDeque::new);
        let timestamps = entry.value_mut();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_per_window as usize {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Requests currently counted against a token.
    pub fn current_count(&self, token: &str) -> usize {
        let now = Instant::now();
        self.requests
            .get(token)
            .map(|e| {
                e.value()
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop a token's counters (e.g. when its session is cleaned up).
    pub fn forget(&self, token: &str) {
        self.requests.remove(token);
    }

    /// Reset all counters (useful for testing).
    pub fn reset_all(&self) {
        self.requests.clear();
    }

    /// Configured per-window maximum.
    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    /// Configured window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_per_window", &self.max_per_window)
            .field("window", &self.window)
            .field("active_tokens", &self.requests.len())
            .finish()
    }
}
