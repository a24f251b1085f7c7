//! Dispatcher configuration
//!
//! This module provides `RateLimitConfig`, the per-model RPM table, and
//! `DispatcherConfig` for configuring the dispatcher.

use crate::error::{ErrorKind, LlmError};
use crate::retry::RetryConfig;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Fallback RPM for models with no entry in the rate table.
pub const DEFAULT_MODEL_RPM: u32 = 60;

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed in any rolling 60-second window.
    pub requests_per_minute: u32,

    /// Maximum sustained requests per second, enforced as a minimum interval
    /// between consecutive requests.
    pub requests_per_second: f64,

    /// Reserved for brief bursts above the sustained rate. Carried in
    /// configuration but not enforced by the acquire algorithm.
    pub burst_allowance: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_second: 1.0,
            burst_allowance: 5,
        }
    }
}

impl RateLimitConfig {
    /// Create a config from an RPM ceiling, deriving the sustained
    /// per-second rate as `max(1/60, rpm/60)`.
    pub fn for_rpm(rpm: u32) -> Self {
        let rps = (rpm as f64 / 60.0).max(1.0 / 60.0);
        Self {
            requests_per_minute: rpm,
            requests_per_second: rps,
            burst_allowance: 5,
        }
    }

    /// Set the requests-per-second ceiling.
    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set the reserved burst allowance.
    pub fn with_burst_allowance(mut self, burst: u32) -> Self {
        self.burst_allowance = burst;
        self
    }

    /// Validate numeric bounds. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.requests_per_minute == 0 {
            return Err(LlmError::Config(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.requests_per_second <= 0.0 {
            return Err(LlmError::Config(
                "requests_per_second must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Model-name-substring → requests-per-minute table.
///
/// This is data, not code: deployments replace or extend the entries out of
/// band. Lookup picks the longest key that is a substring of the
/// (lowercased) model name; unknown models fall back to
/// [`DEFAULT_MODEL_RPM`].
#[derive(Debug, Clone)]
pub struct ModelRateTable {
    entries: HashMap<String, u32>,
}

impl Default for ModelRateTable {
    fn default() -> Self {
        // Seeded with the ceilings observed in production deployments.
        Self::from_entries([
            ("gemini-2.5-pro", 5),
            ("gemini-2.5-flash-lite", 15),
            ("gemini-2.5-flash", 10),
            ("gemma-3", 30),
            ("embedding", 100),
        ])
    }
}

impl ModelRateTable {
    /// Create an empty table (everything falls back to the default RPM).
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Build a table from `(substring, rpm)` entries.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v))
                .collect(),
        }
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, model_substring: impl Into<String>, rpm: u32) {
        self.entries.insert(model_substring.into().to_lowercase(), rpm);
    }

    /// Resolve the RPM ceiling for a model name.
    ///
    /// The longest matching substring wins so that e.g. a `-lite` variant
    /// with its own entry is not shadowed by the base model's entry.
    pub fn rpm_for(&self, model: &str) -> u32 {
        let model_lc = model.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, _)| model_lc.contains(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, rpm)| *rpm)
            .unwrap_or(DEFAULT_MODEL_RPM)
    }
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Model name, matched against the rate table.
    pub model: String,

    /// Per-model RPM ceilings.
    pub rate_table: ModelRateTable,

    /// Retry behavior for transient provider failures.
    pub retry: RetryConfig,

    /// Error kinds the dispatcher retries on.
    pub retry_on: HashSet<ErrorKind>,

    /// Hard ceiling on rate limiter acquisition. On timeout the call
    /// proceeds un-throttled with a warning.
    pub acquire_timeout: Duration,
}

impl DispatcherConfig {
    /// Create a config for the given model with default table, retry
    /// behavior, and classification.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            rate_table: ModelRateTable::default(),
            retry: RetryConfig::default(),
            retry_on: ErrorKind::default_retryable(),
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Set the rate table.
    pub fn with_rate_table(mut self, table: ModelRateTable) -> Self {
        self.rate_table = table;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the retryable error kinds.
    pub fn with_retry_on(mut self, retry_on: HashSet<ErrorKind>) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Set the rate limiter acquisition ceiling.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Validate the configuration. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model.is_empty() {
            return Err(LlmError::Config("model must not be empty".to_string()));
        }
        if self.acquire_timeout.is_zero() {
            return Err(LlmError::Config(
                "acquire_timeout must be positive".to_string(),
            ));
        }
        self.retry.validate()?;
        RateLimitConfig::for_rpm(self.rate_table.rpm_for(&self.model)).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_rpm_derives_rps() {
        let config = RateLimitConfig::for_rpm(120);
        assert_eq!(config.requests_per_minute, 120);
        assert!((config.requests_per_second - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_for_rpm_floors_fractional_rates() {
        // 1 RPM still allows one request per minute, not zero.
        let config = RateLimitConfig::for_rpm(1);
        assert!((config.requests_per_second - 1.0 / 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_limit_validation() {
        assert!(RateLimitConfig::for_rpm(60).validate().is_ok());

        let zero_rpm = RateLimitConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(zero_rpm.validate().is_err());

        let zero_rps = RateLimitConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        assert!(zero_rps.validate().is_err());
    }

    #[test]
    fn test_rate_table_longest_match_wins() {
        let table = ModelRateTable::default();

        assert_eq!(table.rpm_for("gemini-2.5-pro"), 5);
        assert_eq!(table.rpm_for("gemini-2.5-flash"), 10);
        // The -lite entry is longer than the base flash entry, so it wins
        // even though both substrings match.
        assert_eq!(table.rpm_for("gemini-2.5-flash-lite"), 15);
        assert_eq!(table.rpm_for("models/gemini-2.5-flash-lite-001"), 15);
    }

    #[test]
    fn test_rate_table_unknown_model_defaults() {
        let table = ModelRateTable::default();
        assert_eq!(table.rpm_for("claude-sonnet"), DEFAULT_MODEL_RPM);
        assert_eq!(ModelRateTable::empty().rpm_for("anything"), DEFAULT_MODEL_RPM);
    }

    #[test]
    fn test_rate_table_case_insensitive() {
        let table = ModelRateTable::from_entries([("Gemma-3", 30)]);
        assert_eq!(table.rpm_for("GEMMA-3-27b"), 30);
    }

    #[test]
    fn test_dispatcher_config_validation() {
        assert!(DispatcherConfig::new("gemini-2.5-flash").validate().is_ok());

        assert!(DispatcherConfig::new("").validate().is_err());

        let bad_timeout =
            DispatcherConfig::new("gemini-2.5-flash").with_acquire_timeout(Duration::ZERO);
        assert!(bad_timeout.validate().is_err());
    }
}
