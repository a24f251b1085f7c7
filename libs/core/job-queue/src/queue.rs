//! The queue operation surface.
//!
//! `JobQueue` is the seam between the worker / control surfaces and a
//! storage backend. [`crate::RedisJobQueue`] is the durable implementation;
//! [`crate::InMemoryJobQueue`] serves tests and single-process embedding.

use crate::error::JobQueueResult;
use crate::job::{Job, JobFilter, SubmitOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Storage backend for jobs.
///
/// Semantics shared by all implementations:
/// - Missing records and forbidden transitions yield `Ok(false)` /
///   `Ok(None)`, never errors.
/// - `updated_at` advances on every mutation and the remaining record
///   lifetime is preserved.
/// - A job on the pending list has status `pending`; a job in the
///   processing set has status `processing`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Create a pending job, enqueue it FIFO, and index it.
    ///
    /// Returns the new job id. Fails only if the store is unreachable.
    async fn submit(
        &self,
        job_type: &str,
        input: Option<Value>,
        options: SubmitOptions,
    ) -> JobQueueResult<String>;

    /// Load a job by id. `None` if absent or expired.
    async fn get(&self, job_id: &str) -> JobQueueResult<Option<Job>>;

    /// Atomically pop the next pending id (FIFO), transition the record to
    /// processing, and add it to the processing set.
    ///
    /// A popped id whose record has expired yields `Ok(None)` without
    /// retrying; callers poll again. Returning a job carries an implicit
    /// lease: exclusivity rests entirely on the atomic pop.
    async fn get_pending(&self) -> JobQueueResult<Option<Job>>;

    /// Update progress (clamped to 0..=100) and the optional message.
    async fn update_progress(
        &self,
        job_id: &str,
        progress: i64,
        message: Option<&str>,
    ) -> JobQueueResult<bool>;

    /// Mark completed: progress 100, result stored, processing set pruned.
    async fn complete(&self, job_id: &str, result: Option<Value>) -> JobQueueResult<bool>;

    /// Mark failed: error stored, processing set pruned.
    async fn fail(&self, job_id: &str, error: &str) -> JobQueueResult<bool>;

    /// Cancel a pending or processing job; `Ok(false)` for any other state
    /// (idempotent). Removes the id from the pending list and the
    /// processing set.
    async fn cancel(&self, job_id: &str) -> JobQueueResult<bool>;

    /// Put a job back in line after a failed attempt: persist the caller's
    /// copy (with its updated retry metadata) as pending and re-push the id
    /// onto the pending list so a later pop finds it.
    async fn requeue_for_retry(&self, job: &Job) -> JobQueueResult<bool>;

    /// List jobs matching the filter, newest first, limited.
    async fn list(&self, filter: JobFilter) -> JobQueueResult<Vec<Job>>;

    /// Delete terminal jobs older than the threshold, pruning their index
    /// memberships. Returns the number of records deleted.
    async fn cleanup_old(&self, older_than: Duration) -> JobQueueResult<u64>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> bool;
}
