//! In-memory job queue.
//!
//! Implements the same contract as the Redis backend over a mutex-held map,
//! a FIFO deque, and a processing set. Intended for tests and for embedding
//! the queue in a single process without external infrastructure; it does
//! not survive restarts and does not coordinate across processes.

use crate::error::{JobQueueError, JobQueueResult};
use crate::job::{clamp_progress, Job, JobFilter, JobStatus, SubmitOptions};
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use core_clock::{Clock, SystemClock};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

struct StoredJob {
    job: Job,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<String, StoredJob>,
    pending: VecDeque<String>,
    processing: HashSet<String>,
}

/// Mutex-held implementation of [`JobQueue`].
pub struct InMemoryJobQueue {
    state: tokio::sync::Mutex<MemoryState>,
    default_ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a queue with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: tokio::sync::Mutex::new(MemoryState::default()),
            default_ttl_secs: 86_400,
            clock,
        }
    }

    /// Set the default record TTL.
    pub fn with_default_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// Number of ids currently in the processing set.
    pub async fn processing_count(&self) -> usize {
        self.state.lock().await.processing.len()
    }

    /// Number of ids currently on the pending list.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Drop a stored job if its TTL has lapsed; returns a live clone.
    fn live_job(state: &mut MemoryState, job_id: &str, now: DateTime<Utc>) -> Option<Job> {
        let expired = state
            .jobs
            .get(job_id)
            .is_some_and(|stored| stored.expires_at <= now);
        if expired {
            state.jobs.remove(job_id);
            return None;
        }
        state.jobs.get(job_id).map(|stored| stored.job.clone())
    }

    fn store(state: &mut MemoryState, job: Job, expires_at: DateTime<Utc>) {
        state.jobs.insert(job.id.clone(), StoredJob { job, expires_at });
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn submit(
        &self,
        job_type: &str,
        input: Option<Value>,
        options: SubmitOptions,
    ) -> JobQueueResult<String> {
        let job_id = Uuid::new_v4().to_string();
        let now = self.clock.now_utc();
        let ttl = options.ttl_secs.unwrap_or(self.default_ttl_secs);
        let job = Job::new(&job_id, job_type, now, input, options);

        let expires_at = now
            + ChronoDuration::from_std(Duration::from_secs(ttl))
                .map_err(|e| JobQueueError::Config(format!("ttl out of range: {e}")))?;

        let mut state = self.state.lock().await;
        Self::store(&mut state, job, expires_at);
        state.pending.push_back(job_id.clone());

        info!(job_id = %job_id, job_type = %job_type, "job submitted");
        Ok(job_id)
    }

    async fn get(&self, job_id: &str) -> JobQueueResult<Option<Job>> {
        let mut state = self.state.lock().await;
        Ok(Self::live_job(&mut state, job_id, self.clock.now_utc()))
    }

    async fn get_pending(&self) -> JobQueueResult<Option<Job>> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        let Some(job_id) = state.pending.pop_front() else {
            return Ok(None);
        };

        let Some(mut job) = Self::live_job(&mut state, &job_id, now) else {
            warn!(job_id = %job_id, "job found in queue but record missing");
            return Ok(None);
        };

        job.status = JobStatus::Processing;
        job.updated_at = now;
        state.processing.insert(job_id.clone());

        let expires_at = state.jobs[&job_id].expires_at;
        Self::store(&mut state, job.clone(), expires_at);

        info!(job_id = %job_id, job_type = %job.job_type, "job moved to processing");
        Ok(Some(job))
    }

    async fn update_progress(
        &self,
        job_id: &str,
        progress: i64,
        message: Option<&str>,
    ) -> JobQueueResult<bool> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        let Some(mut job) = Self::live_job(&mut state, job_id, now) else {
            return Ok(false);
        };

        job.progress = clamp_progress(progress);
        if let Some(message) = message {
            job.progress_message = Some(message.to_string());
        }
        job.updated_at = now;

        let expires_at = state.jobs[job_id].expires_at;
        Self::store(&mut state, job, expires_at);
        Ok(true)
    }

    async fn complete(&self, job_id: &str, result: Option<Value>) -> JobQueueResult<bool> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        let Some(mut job) = Self::live_job(&mut state, job_id, now) else {
            return Ok(false);
        };

        job.status = JobStatus::Completed;
        job.progress = 100;
        job.result = result;
        job.updated_at = now;
        state.processing.remove(job_id);

        let expires_at = state.jobs[job_id].expires_at;
        Self::store(&mut state, job, expires_at);
        Ok(true)
    }

    async fn fail(&self, job_id: &str, error: &str) -> JobQueueResult<bool> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        let Some(mut job) = Self::live_job(&mut state, job_id, now) else {
            return Ok(false);
        };

        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.updated_at = now;
        state.processing.remove(job_id);

        let expires_at = state.jobs[job_id].expires_at;
        Self::store(&mut state, job, expires_at);
        Ok(true)
    }

    async fn cancel(&self, job_id: &str) -> JobQueueResult<bool> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        let Some(mut job) = Self::live_job(&mut state, job_id, now) else {
            return Ok(false);
        };

        if !matches!(job.status, JobStatus::Pending | JobStatus::Processing) {
            return Ok(false);
        }

        job.status = JobStatus::Cancelled;
        job.updated_at = now;
        state.pending.retain(|id| id != job_id);
        state.processing.remove(job_id);

        let expires_at = state.jobs[job_id].expires_at;
        Self::store(&mut state, job, expires_at);

        info!(job_id = %job_id, "job cancelled");
        Ok(true)
    }

    async fn requeue_for_retry(&self, job: &Job) -> JobQueueResult<bool> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_utc();

        // Persist the caller's copy: it carries the updated retry metadata.
        let mut job = job.clone();
        job.status = JobStatus::Pending;
        job.updated_at = now;

        state.processing.remove(&job.id);

        let expires_at = state
            .jobs
            .get(&job.id)
            .map(|stored| stored.expires_at)
            .unwrap_or_else(|| now + ChronoDuration::seconds(self.default_ttl_secs as i64));
        let job_id = job.id.clone();
        Self::store(&mut state, job, expires_at);
        state.pending.push_back(job_id.clone());

        info!(job_id = %job_id, "job requeued for retry");
        Ok(true)
    }

    async fn list(&self, filter: JobFilter) -> JobQueueResult<Vec<Job>> {
        let state = self.state.lock().await;
        let now = self.clock.now_utc();

        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.job.clone())
            .filter(|job| filter.matches(job))
            .collect();

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(filter.limit);
        Ok(jobs)
    }

    async fn cleanup_old(&self, older_than: Duration) -> JobQueueResult<u64> {
        let mut state = self.state.lock().await;
        let cutoff = self.clock.now_utc()
            - ChronoDuration::from_std(older_than)
                .map_err(|e| JobQueueError::Config(format!("older_than out of range: {e}")))?;

        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, stored| !(stored.job.status.is_terminal() && stored.job.created_at < cutoff));
        let deleted = (before - state.jobs.len()) as u64;

        if deleted > 0 {
            info!(deleted, "cleaned up old jobs");
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
