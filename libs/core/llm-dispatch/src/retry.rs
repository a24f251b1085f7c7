//! Generic retry with backoff and jitter.
//!
//! This module provides:
//! - `BackoffStrategy` - exponential, linear, or fixed delay growth
//! - `RetryConfig` - numeric parameters plus the strategy
//! - `retry_async` / `retry_blocking` - drivers for both calling styles
//!
//! The delay computation is a pure function of `(attempt, strategy, base,
//! max, jitter)`; which failures are retryable is decided by a
//! caller-supplied classifier, so the module itself is error-type agnostic.

use crate::error::LlmError;
use core_clock::{Clock, SystemClock};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How the delay grows with the attempt index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `base * 2^attempt`
    Exponential,
    /// `base * (attempt + 1)`
    Linear,
    /// `base`
    Fixed,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Ceiling applied after jitter.
    pub max_delay: Duration,

    /// Delay growth strategy.
    pub strategy: BackoffStrategy,

    /// Jitter factor in `[0, 1]`: the delay is stretched by up to
    /// `delay * jitter_factor` to avoid thundering herds.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.5,
        }
    }
}

impl RetryConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the jitter factor (must stay in `[0, 1]`).
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter;
        self
    }

    /// Validate numeric bounds. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), LlmError> {
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(LlmError::Config(format!(
                "jitter_factor must be in [0, 1], got {}",
                self.jitter_factor
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(LlmError::Config(
                "max_delay must be at least base_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Compute the delay before the retry with the given 0-based attempt
    /// index: strategy growth, then jitter, then the `max_delay` cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let raw = match self.strategy {
            BackoffStrategy::Exponential => base * 2f64.powi(attempt.min(i32::MAX as u32) as i32),
            BackoffStrategy::Linear => base * (attempt as f64 + 1.0),
            BackoffStrategy::Fixed => base,
        };
        let jittered = raw + raw * self.jitter_factor * rand::random::<f64>();
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()))
    }
}

/// Call an async operation, retrying classified-retryable failures.
///
/// The operation is invoked at most `max_retries + 1` times. Each failed
/// attempt is logged as a warning with its index and the computed delay; the
/// final failure is logged as an error. Non-retryable errors propagate
/// immediately without sleeping.
pub async fn retry_async<T, E, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_async_with_clock(config, &SystemClock, is_retryable, operation).await
}

/// [`retry_async`] with the backoff sleeps routed through a clock.
pub async fn retry_async_with_clock<T, E, F, Fut>(
    config: &RetryConfig,
    clock: &dyn Clock,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) if is_retryable(&err) && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if is_retryable(&err) {
                    error!(
                        attempts = attempt + 1,
                        error = %err,
                        "final attempt failed, no more retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

/// Blocking counterpart of [`retry_async`] for synchronous callables.
///
/// Sleeps the calling thread between attempts (there is no runtime to hand
/// the wait back to); do not call from async contexts.
pub fn retry_blocking<T, E, F>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation() {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) if is_retryable(&err) && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if is_retryable(&err) {
                    error!(
                        attempts = attempt + 1,
                        error = %err,
                        "final attempt failed, no more retries"
                    );
                }
                return Err(err);
            }
        }
    }
}
