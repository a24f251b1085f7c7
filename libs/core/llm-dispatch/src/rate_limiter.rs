//! Client-side rate limiter for provider calls.
//!
//! Enforces a rolling requests-per-minute window plus a minimum interval
//! between consecutive requests. The limiter records timestamps of accepted
//! requests and serializes the check-and-record with a mutex, so concurrent
//! callers are throttled as a group. `acquire` sleeps the caller as needed
//! and never returns an error.
//!
//! The limiter is in-process only: it does not coordinate limits across
//! processes or machines.

use crate::config::RateLimitConfig;
use core_clock::{Clock, SystemClock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Sliding window of the last minute's accepted request times.
#[derive(Debug, Default)]
struct LimiterState {
    /// Epoch-seconds timestamps of accepted requests within the window.
    request_times: VecDeque<f64>,
    /// Timestamp of the most recent accepted request.
    last_request: f64,
}

/// Sliding-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter with an injected clock.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState::default()),
            clock,
        }
    }

    /// Acquire permission to make a request, sleeping as needed.
    ///
    /// Holds the internal lock across the sleeps: throttling concurrent
    /// callers is the point, and a caller that would release the lock around
    /// the sleep would have to recompute the window afterwards anyway.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let mut now = self.clock.epoch_secs();

        // Drop timestamps that have left the 60-second window.
        let cutoff = now - 60.0;
        while state.request_times.front().is_some_and(|t| *t <= cutoff) {
            state.request_times.pop_front();
        }

        // Rolling requests-per-minute ceiling: wait for the oldest recorded
        // request to exit the window.
        if state.request_times.len() >= self.config.requests_per_minute as usize {
            if let Some(oldest) = state.request_times.front().copied() {
                let sleep_secs = 60.0 - (now - oldest);
                if sleep_secs > 0.0 {
                    warn!(
                        sleep_secs,
                        requests_per_minute = self.config.requests_per_minute,
                        "rate limit reached, sleeping"
                    );
                    self.clock.sleep(Duration::from_secs_f64(sleep_secs)).await;
                    now = self.clock.epoch_secs();
                }
            }
        }

        // Minimum interval between consecutive requests.
        let min_interval = 1.0 / self.config.requests_per_second;
        let since_last = now - state.last_request;
        if since_last < min_interval {
            self.clock
                .sleep(Duration::from_secs_f64(min_interval - since_last))
                .await;
            now = self.clock.epoch_secs();
        }

        // Record the approved request.
        state.request_times.push_back(now);
        state.last_request = now;
    }

    /// Number of accepted requests still inside the rolling window.
    pub async fn window_len(&self) -> usize {
        let state = self.state.lock().await;
        let cutoff = self.clock.epoch_secs() - 60.0;
        state.request_times.iter().filter(|t| **t > cutoff).count()
    }
}
