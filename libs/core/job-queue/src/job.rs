//! The job record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key the worker uses to track retry attempts.
pub const RETRY_COUNT_KEY: &str = "retry_count";

/// Metadata key holding the most recent handler error.
pub const LAST_ERROR_KEY: &str = "last_error";

/// Job lifecycle states.
///
/// Transitions form a DAG: pending→processing,
/// processing→{completed, failed, pending (retry), cancelled},
/// pending→cancelled. There is no way out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// States with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The terminal states swept by cleanup.
    pub const TERMINAL: [JobStatus; 3] = [Self::Completed, Self::Failed, Self::Cancelled];
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique id, assigned at submission, immutable.
    pub id: String,

    /// Selects which handler executes the job.
    pub job_type: String,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    /// Advances on every mutation.
    pub updated_at: DateTime<Utc>,

    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,

    /// Opaque payload supplied by the submitter.
    pub input: Option<Value>,

    /// Progress percentage, clamped to 0..=100.
    pub progress: u8,
    pub progress_message: Option<String>,

    /// Set on successful completion.
    pub result: Option<Value>,

    /// Set on failure; preserved across retries via metadata.
    pub error: Option<String>,

    /// Free-form map; `retry_count` and `last_error` are reserved for the
    /// worker.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Job {
    /// Create a fresh pending job.
    pub fn new(
        id: impl Into<String>,
        job_type: impl Into<String>,
        now: DateTime<Utc>,
        input: Option<Value>,
        options: SubmitOptions,
    ) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            tenant_id: options.tenant_id,
            user_id: options.user_id,
            session_id: options.session_id,
            input,
            progress: 0,
            progress_message: None,
            result: None,
            error: None,
            metadata: options.metadata.unwrap_or_default(),
        }
    }

    /// Retry attempts recorded so far (0 when absent).
    pub fn retry_count(&self) -> u32 {
        self.metadata
            .get(RETRY_COUNT_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    /// Record a failed attempt: bump the retry count and remember the error.
    pub fn record_retry_attempt(&mut self, error: &str) {
        let next = self.retry_count() + 1;
        self.metadata
            .insert(RETRY_COUNT_KEY.to_string(), Value::from(next));
        self.metadata
            .insert(LAST_ERROR_KEY.to_string(), Value::from(error));
    }
}

/// Optional scoping and lifetime parameters for `submit`.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Record lifetime in seconds; falls back to the queue default.
    pub ttl_secs: Option<u64>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }
}

/// Filters for `list`. Filters combine as a conjunction.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            tenant_id: None,
            user_id: None,
            limit: 100,
        }
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether a loaded job passes every set filter.
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(tenant_id) = &self.tenant_id {
            if job.tenant_id.as_deref() != Some(tenant_id.as_str()) {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if job.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Clamp a caller-supplied progress value into 0..=100.
pub(crate) fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        let mut job = Job::new(
            "job-1",
            "echo",
            Utc::now(),
            Some(serde_json::json!({"x": 1})),
            SubmitOptions::new().with_tenant_id("acme"),
        );
        job.status = status;
        job
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"cancelled\"").unwrap(),
            JobStatus::Cancelled
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_job_roundtrips_through_json() {
        let original = job(JobStatus::Pending);
        let serialized = serde_json::to_string(&original).unwrap();
        let parsed: Job = serde_json::from_str(&serialized).unwrap();

        assert_eq!(parsed.id, "job-1");
        assert_eq!(parsed.job_type, "echo");
        assert_eq!(parsed.status, JobStatus::Pending);
        assert_eq!(parsed.tenant_id.as_deref(), Some("acme"));
        assert_eq!(parsed.input, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_retry_count_defaults_to_zero() {
        assert_eq!(job(JobStatus::Pending).retry_count(), 0);
    }

    #[test]
    fn test_record_retry_attempt() {
        let mut job = job(JobStatus::Processing);

        job.record_retry_attempt("first failure");
        assert_eq!(job.retry_count(), 1);
        assert_eq!(
            job.metadata.get(LAST_ERROR_KEY).and_then(Value::as_str),
            Some("first failure")
        );

        job.record_retry_attempt("second failure");
        assert_eq!(job.retry_count(), 2);
        assert_eq!(
            job.metadata.get(LAST_ERROR_KEY).and_then(Value::as_str),
            Some("second failure")
        );
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(0), 0);
        assert_eq!(clamp_progress(42), 42);
        assert_eq!(clamp_progress(100), 100);
        assert_eq!(clamp_progress(250), 100);
    }

    #[test]
    fn test_filter_conjunction() {
        let job = job(JobStatus::Pending);

        assert!(JobFilter::new().matches(&job));
        assert!(JobFilter::new()
            .with_status(JobStatus::Pending)
            .with_tenant_id("acme")
            .matches(&job));
        assert!(!JobFilter::new()
            .with_status(JobStatus::Completed)
            .matches(&job));
        assert!(!JobFilter::new()
            .with_status(JobStatus::Pending)
            .with_tenant_id("other")
            .matches(&job));
        assert!(!JobFilter::new().with_user_id("u-1").matches(&job));
    }
}
