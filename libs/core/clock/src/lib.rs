//! Wall-clock and sleep abstraction.
//!
//! Time-sensitive components (the rate limiter's sliding window, the job
//! worker's poll and retry sleeps, job timestamps) read time and sleep through
//! the [`Clock`] trait instead of calling `Utc::now()` / `tokio::time::sleep`
//! directly. Production code uses [`SystemClock`]; tests inject
//! [`ManualClock`] so that a "60 second" throttle sleep completes instantly
//! while still being observable.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// Source of wall-clock time and sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current wall-clock time as fractional seconds since the Unix epoch.
    fn epoch_secs(&self) -> f64 {
        self.now_utc().timestamp_micros() as f64 / 1_000_000.0
    }

    /// Suspend the caller for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// The real wall clock backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock whose time only moves when told to (or when something sleeps).
///
/// `sleep` advances the clock by the requested duration and returns
/// immediately, so code under test experiences the passage of time without
/// the test actually waiting.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock starting at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a manual clock starting at a fixed instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(duration).expect("duration out of range");
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
