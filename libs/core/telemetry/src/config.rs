//! Pipeline configuration
//!
//! This module provides `TelemetryConfig` for configuring the log pipeline.

use crate::error::TelemetryError;
use std::time::Duration;

/// Configuration for the telemetry pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Full collector URL (OTLP/HTTP logs endpoint).
    pub endpoint: String,

    /// Extra HTTP headers (e.g. bearer token or API key).
    pub headers: Vec<(String, String)>,

    /// Per-attempt HTTP timeout.
    pub timeout: Duration,

    /// Skip TLS certificate verification (local collectors only).
    pub insecure: bool,

    /// Service name reported in the resource block.
    pub service_name: String,

    /// Optional service version reported in the resource block.
    pub service_version: Option<String>,

    /// Scope name reported in the scope block.
    pub scope_name: String,

    /// Bounded producer queue capacity; producers drop when it is full.
    pub queue_capacity: usize,

    /// Flush when the batch reaches this many records.
    pub max_batch_size: usize,

    /// Flush when the oldest batched record reaches this age.
    pub max_batch_age: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318/v1/logs".to_string(),
            headers: Vec::new(),
            timeout: Duration::from_secs(10),
            insecure: false,
            service_name: "unknown_service".to_string(),
            service_version: None,
            scope_name: "telemetry".to_string(),
            queue_capacity: 1000,
            max_batch_size: 100,
            max_batch_age: Duration::from_secs(5),
        }
    }
}

impl TelemetryConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Add an HTTP header sent with every batch.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the per-attempt HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS verification (local collectors only).
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the reported service name.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the reported service version.
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    /// Set the producer queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the batch size flush threshold.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Set the batch age flush threshold.
    pub fn with_max_batch_age(mut self, age: Duration) -> Self {
        self.max_batch_age = age;
        self
    }

    /// Validate numeric bounds. Programmer errors fail fast here.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.endpoint.is_empty() {
            return Err(TelemetryError::Config(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(TelemetryError::Config(
                "queue_capacity must be positive".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(TelemetryError::Config(
                "max_batch_size must be positive".to_string(),
            ));
        }
        if self.max_batch_age.is_zero() {
            return Err(TelemetryError::Config(
                "max_batch_age must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
