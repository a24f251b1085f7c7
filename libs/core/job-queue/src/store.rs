//! Redis-backed job queue.
//!
//! Persisted layout (all keys under the configured prefix):
//! - record: `{prefix}job:{id}`, the JSON record stored with a TTL
//! - pending queue: `{prefix}queue:pending`, a FIFO list (RPUSH / LPOP)
//! - processing set: `{prefix}set:processing`, ids currently leased
//! - indices: `{prefix}index:status:{status}`, `{prefix}index:tenant:{t}`,
//!   `{prefix}index:user:{u}`, sets of job ids
//!
//! Mutations preserve the record's remaining TTL and advance `updated_at`.
//! Indices are eventually consistent on failure paths; readers tolerate an
//! indexed id whose record has expired.

use crate::config::JobQueueConfig;
use crate::connect::{connect_with_retry, ConnectRetry};
use crate::error::{JobQueueError, JobQueueResult};
use crate::job::{clamp_progress, Job, JobFilter, JobStatus, SubmitOptions};
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use core_clock::{Clock, SystemClock};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Key construction for the persisted layout.
#[derive(Debug, Clone)]
struct KeySpace {
    prefix: String,
}

impl KeySpace {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn job(&self, job_id: &str) -> String {
        format!("{}job:{job_id}", self.prefix)
    }

    fn job_pattern(&self) -> String {
        format!("{}job:*", self.prefix)
    }

    fn job_prefix(&self) -> String {
        format!("{}job:", self.prefix)
    }

    fn pending_queue(&self) -> String {
        format!("{}queue:pending", self.prefix)
    }

    fn processing_set(&self) -> String {
        format!("{}set:processing", self.prefix)
    }

    fn status_index(&self, status: JobStatus) -> String {
        format!("{}index:status:{status}", self.prefix)
    }

    fn tenant_index(&self, tenant_id: &str) -> String {
        format!("{}index:tenant:{tenant_id}", self.prefix)
    }

    fn user_index(&self, user_id: &str) -> String {
        format!("{}index:user:{user_id}", self.prefix)
    }
}

/// Redis-backed implementation of [`JobQueue`].
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    config: JobQueueConfig,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
}

impl RedisJobQueue {
    /// Connect to Redis (with retry) and build a queue.
    pub async fn connect(config: JobQueueConfig) -> JobQueueResult<Self> {
        config.validate()?;
        let conn = connect_with_retry(&config.url, ConnectRetry::default()).await?;
        Ok(Self::from_manager(conn, config))
    }

    /// Build a queue over an existing connection manager.
    pub fn from_manager(conn: ConnectionManager, config: JobQueueConfig) -> Self {
        let keys = KeySpace::new(config.key_prefix.clone());
        Self {
            conn,
            config,
            keys,
            clock: Arc::new(SystemClock),
        }
    }

    /// Inject a clock (tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load and parse a record. Unparseable records are logged and treated
    /// as absent.
    async fn load(&self, job_id: &str) -> JobQueueResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(self.keys.job(job_id)).await?;

        let Some(data) = data else {
            return Ok(None);
        };

        match serde_json::from_str(&data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to parse job record");
                Ok(None)
            }
        }
    }

    /// Persist a mutated record, preserving its remaining TTL, and keep the
    /// status indices in step when the status changed.
    async fn persist_update(
        &self,
        job: &mut Job,
        old_status: Option<JobStatus>,
    ) -> JobQueueResult<()> {
        job.updated_at = self.clock.now_utc();

        let mut conn = self.conn.clone();
        let key = self.keys.job(&job.id);

        let remaining: i64 = conn.ttl(&key).await?;
        let ttl = if remaining <= 0 {
            self.config.default_ttl_secs
        } else {
            remaining as u64
        };

        let data = serde_json::to_string(job)?;
        conn.set_ex::<_, _, ()>(&key, data, ttl).await?;

        if let Some(old_status) = old_status {
            if old_status != job.status {
                conn.srem::<_, _, ()>(self.keys.status_index(old_status), &job.id)
                    .await?;
                conn.sadd::<_, _, ()>(self.keys.status_index(job.status), &job.id)
                    .await?;
            }
        }

        Ok(())
    }

    /// Add a job to the status/tenant/user indices.
    async fn add_to_indices(&self, job: &Job) -> JobQueueResult<()> {
        let mut conn = self.conn.clone();

        conn.sadd::<_, _, ()>(self.keys.status_index(job.status), &job.id)
            .await?;

        if let Some(tenant_id) = &job.tenant_id {
            conn.sadd::<_, _, ()>(self.keys.tenant_index(tenant_id), &job.id)
                .await?;
        }
        if let Some(user_id) = &job.user_id {
            conn.sadd::<_, _, ()>(self.keys.user_index(user_id), &job.id)
                .await?;
        }

        Ok(())
    }

    /// Collect candidate ids for a list query from the most selective
    /// available index, falling back to a SCAN over record keys.
    async fn candidate_ids(&self, filter: &JobFilter) -> JobQueueResult<Vec<String>> {
        let mut conn = self.conn.clone();

        if let Some(status) = filter.status {
            return Ok(conn.smembers(self.keys.status_index(status)).await?);
        }
        if let Some(tenant_id) = &filter.tenant_id {
            return Ok(conn.smembers(self.keys.tenant_index(tenant_id)).await?);
        }
        if let Some(user_id) = &filter.user_id {
            return Ok(conn.smembers(self.keys.user_index(user_id)).await?);
        }

        let job_prefix = self.keys.job_prefix();
        let pattern = self.keys.job_pattern();
        let mut ids = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            for key in keys {
                ids.push(key[job_prefix.len()..].to_string());
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(ids)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn submit(
        &self,
        job_type: &str,
        input: Option<Value>,
        options: SubmitOptions,
    ) -> JobQueueResult<String> {
        let job_id = Uuid::new_v4().to_string();
        let ttl = options.ttl_secs.unwrap_or(self.config.default_ttl_secs);
        let job = Job::new(&job_id, job_type, self.clock.now_utc(), input, options);

        let mut conn = self.conn.clone();
        let data = serde_json::to_string(&job)?;
        conn.set_ex::<_, _, ()>(self.keys.job(&job_id), data, ttl)
            .await?;
        conn.rpush::<_, _, ()>(self.keys.pending_queue(), &job_id)
            .await?;

        self.add_to_indices(&job).await?;

        info!(job_id = %job_id, job_type = %job_type, "job submitted");
        Ok(job_id)
    }

    async fn get(&self, job_id: &str) -> JobQueueResult<Option<Job>> {
        self.load(job_id).await
    }

    async fn get_pending(&self) -> JobQueueResult<Option<Job>> {
        let mut conn = self.conn.clone();

        let job_id: Option<String> = conn.lpop(self.keys.pending_queue(), None).await?;
        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let Some(mut job) = self.load(&job_id).await? else {
            // The record expired while the id sat on the queue.
            warn!(job_id = %job_id, "job found in queue but record missing");
            return Ok(None);
        };

        let old_status = job.status;
        job.status = JobStatus::Processing;

        conn.sadd::<_, _, ()>(self.keys.processing_set(), &job_id)
            .await?;
        self.persist_update(&mut job, Some(old_status)).await?;

        info!(job_id = %job_id, job_type = %job.job_type, "job moved to processing");
        Ok(Some(job))
    }

    async fn update_progress(
        &self,
        job_id: &str,
        progress: i64,
        message: Option<&str>,
    ) -> JobQueueResult<bool> {
        let Some(mut job) = self.load(job_id).await? else {
            return Ok(false);
        };

        job.progress = clamp_progress(progress);
        if let Some(message) = message {
            job.progress_message = Some(message.to_string());
        }

        self.persist_update(&mut job, None).await?;
        Ok(true)
    }

    async fn complete(&self, job_id: &str, result: Option<Value>) -> JobQueueResult<bool> {
        let Some(mut job) = self.load(job_id).await? else {
            return Ok(false);
        };

        let old_status = job.status;
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.result = result;

        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(self.keys.processing_set(), job_id)
            .await?;

        self.persist_update(&mut job, Some(old_status)).await?;
        Ok(true)
    }

    async fn fail(&self, job_id: &str, error: &str) -> JobQueueResult<bool> {
        let Some(mut job) = self.load(job_id).await? else {
            return Ok(false);
        };

        let old_status = job.status;
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());

        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(self.keys.processing_set(), job_id)
            .await?;

        self.persist_update(&mut job, Some(old_status)).await?;
        Ok(true)
    }

    async fn cancel(&self, job_id: &str) -> JobQueueResult<bool> {
        let Some(mut job) = self.load(job_id).await? else {
            return Ok(false);
        };

        if !matches!(job.status, JobStatus::Pending | JobStatus::Processing) {
            return Ok(false);
        }

        let old_status = job.status;
        job.status = JobStatus::Cancelled;

        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.keys.pending_queue(), 0, job_id)
            .await?;
        conn.srem::<_, _, ()>(self.keys.processing_set(), job_id)
            .await?;

        self.persist_update(&mut job, Some(old_status)).await?;
        info!(job_id = %job_id, "job cancelled");
        Ok(true)
    }

    async fn requeue_for_retry(&self, job: &Job) -> JobQueueResult<bool> {
        // Persist the caller's copy: it carries the updated retry metadata
        // that a fresh load would lose.
        let mut job = job.clone();
        let old_status = job.status;
        job.status = JobStatus::Pending;

        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(self.keys.processing_set(), &job.id)
            .await?;

        self.persist_update(&mut job, Some(old_status)).await?;

        // Back onto the pending list so a later pop finds it.
        conn.rpush::<_, _, ()>(self.keys.pending_queue(), &job.id)
            .await?;

        info!(job_id = %job.id, retry_count = job.retry_count(), "job requeued for retry");
        Ok(true)
    }

    async fn list(&self, filter: JobFilter) -> JobQueueResult<Vec<Job>> {
        let ids = self.candidate_ids(&filter).await?;

        let mut jobs = Vec::new();
        for id in ids {
            if let Some(job) = self.load(&id).await? {
                if filter.matches(&job) {
                    jobs.push(job);
                }
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(filter.limit);
        Ok(jobs)
    }

    async fn cleanup_old(&self, older_than: Duration) -> JobQueueResult<u64> {
        let cutoff = self.clock.now_utc()
            - ChronoDuration::from_std(older_than)
                .map_err(|e| JobQueueError::Config(format!("older_than out of range: {e}")))?;

        let mut conn = self.conn.clone();
        let mut deleted: u64 = 0;

        for status in JobStatus::TERMINAL {
            let status_key = self.keys.status_index(status);
            let ids: Vec<String> = conn.smembers(&status_key).await?;

            for job_id in ids {
                let Some(job) = self.load(&job_id).await? else {
                    // Record expired; prune the dangling index entry.
                    conn.srem::<_, _, ()>(&status_key, &job_id).await?;
                    continue;
                };

                if job.created_at >= cutoff {
                    continue;
                }

                conn.del::<_, ()>(self.keys.job(&job_id)).await?;
                conn.srem::<_, _, ()>(&status_key, &job_id).await?;
                if let Some(tenant_id) = &job.tenant_id {
                    conn.srem::<_, _, ()>(self.keys.tenant_index(tenant_id), &job_id)
                        .await?;
                }
                if let Some(user_id) = &job.user_id {
                    conn.srem::<_, _, ()>(self.keys.user_index(user_id), &job_id)
                        .await?;
                }
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(deleted, "cleaned up old jobs");
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "health check failed");
                false
            }
        }
    }
}
