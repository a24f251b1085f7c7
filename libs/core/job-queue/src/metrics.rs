//! Metrics for job queue observability.
//!
//! Prometheus-compatible metrics recorded through the `metrics` facade.
//!
//! ## Available Metrics
//!
//! - `job_queue_jobs_processed_total` - Counter of jobs processed by outcome
//! - `job_queue_job_duration_seconds` - Histogram of handler execution time
//! - `job_queue_retries_total` - Counter of retry attempts

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency
pub mod names {
    pub const JOBS_PROCESSED: &str = "job_queue_jobs_processed_total";
    pub const JOB_DURATION: &str = "job_queue_job_duration_seconds";
    pub const RETRIES: &str = "job_queue_retries_total";
}

/// Job outcome for metrics labeling
#[derive(Debug, Clone, Copy)]
pub enum JobOutcome {
    Completed,
    Failed,
    Retried,
    MissingHandler,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retried => "retried",
            Self::MissingHandler => "missing_handler",
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        })
        .clone()
}

/// Get the global Prometheus handle.
///
/// Returns None if metrics haven't been initialized.
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Record a job as processed with the given outcome.
pub fn record_job_processed(job_type: &str, outcome: JobOutcome) {
    counter!(
        names::JOBS_PROCESSED,
        "job_type" => job_type.to_string(),
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

/// Record handler execution time.
pub fn record_job_duration(job_type: &str, duration: Duration) {
    histogram!(
        names::JOB_DURATION,
        "job_type" => job_type.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a retry attempt.
pub fn record_retry(job_type: &str, attempt: u32) {
    counter!(
        names::RETRIES,
        "job_type" => job_type.to_string(),
        "attempt" => attempt.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_as_str() {
        assert_eq!(JobOutcome::Completed.as_str(), "completed");
        assert_eq!(JobOutcome::Failed.as_str(), "failed");
        assert_eq!(JobOutcome::Retried.as_str(), "retried");
        assert_eq!(JobOutcome::MissingHandler.as_str(), "missing_handler");
    }
}
