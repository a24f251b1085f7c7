//! Queue and worker configuration
//!
//! This module provides `JobQueueConfig` for the Redis-backed store and
//! `WorkerConfig` for the worker loop.

use crate::error::JobQueueError;
use std::time::Duration;

/// Configuration for the Redis-backed job queue.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Redis connection URL.
    pub url: String,

    /// Prefix for every key the queue owns.
    pub key_prefix: String,

    /// Record lifetime applied when the submitter does not set one, and
    /// re-applied when a mutated record has no remaining TTL.
    pub default_ttl_secs: u64,
}

impl JobQueueConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: "jobs:".to_string(),
            default_ttl_secs: 86_400,
        }
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the default record TTL.
    pub fn with_default_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// Validate numeric bounds. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), JobQueueError> {
        if self.url.is_empty() {
            return Err(JobQueueError::Config("url must not be empty".to_string()));
        }
        if self.default_ttl_secs == 0 {
            return Err(JobQueueError::Config(
                "default_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

/// Configuration for the job worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to wait between polls when the queue is empty.
    pub poll_interval: Duration,

    /// Maximum retry attempts before a job is failed for good.
    pub max_retries: u32,

    /// Pause after requeueing a failed job.
    pub retry_delay: Duration,

    /// Stop after processing this many jobs (None = run until shutdown).
    pub max_jobs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            max_jobs: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the pause after requeueing a failed job.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Bound the number of jobs processed before the loop stops.
    pub fn with_max_jobs(mut self, max_jobs: u64) -> Self {
        self.max_jobs = Some(max_jobs);
        self
    }

    /// Validate numeric bounds. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), JobQueueError> {
        if self.poll_interval.is_zero() {
            return Err(JobQueueError::Config(
                "poll_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
