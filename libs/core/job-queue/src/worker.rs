//! The background worker: handler registry and the processing loop.
//!
//! This module provides:
//! - `JobHandler` - the trait job handlers implement
//! - `JobWorker` - polls the queue, dispatches to handlers, and applies the
//!   retry policy
//!
//! The registry is flat and data-driven: a map from type string to handler.
//! Handlers receive the job and return a result payload, or an error that
//! the worker turns into a retry or a final failure.

use crate::config::WorkerConfig;
use crate::error::{JobQueueError, JobQueueResult};
use crate::job::Job;
use crate::metrics::{self, JobOutcome};
use crate::queue::JobQueue;
use async_trait::async_trait;
use core_clock::{Clock, SystemClock};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A handler for one job type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process a job and return its result payload.
    async fn handle(&self, job: &Job) -> JobQueueResult<Value>;
}

/// Adapter so plain async closures can be registered as handlers.
struct FnHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = JobQueueResult<Value>> + Send,
{
    async fn handle(&self, job: &Job) -> JobQueueResult<Value> {
        (self.func)(job.clone()).await
    }
}

/// Background worker processing queued jobs.
///
/// Multiple worker processes may share one queue; each `get_pending` pop is
/// atomic, so concurrent workers receive distinct jobs.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    config: WorkerConfig,
    clock: Arc<dyn Clock>,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, config: WorkerConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Inject a clock (tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a handler for a job type.
    pub fn register_handler(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let job_type = job_type.into();
        info!(job_type = %job_type, "registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Register an async closure as a handler.
    pub fn register_fn<F, Fut>(&mut self, job_type: impl Into<String>, func: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobQueueResult<Value>> + Send + 'static,
    {
        self.register_handler(job_type, Arc::new(FnHandler { func }));
    }

    /// Run the worker loop until shutdown is signalled (or `max_jobs` is
    /// reached).
    ///
    /// The loop polls `get_pending`, sleeping `poll_interval` between empty
    /// polls. Shutdown is honored between jobs, never mid-job.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> JobQueueResult<()> {
        self.config.validate()?;
        if self.handlers.is_empty() {
            return Err(JobQueueError::Config(
                "no job handlers registered".to_string(),
            ));
        }

        let registered: Vec<&String> = self.handlers.keys().collect();
        info!(handlers = ?registered, "job worker started");

        let mut processed: u64 = 0;

        loop {
            if *shutdown.borrow() {
                info!("received shutdown signal, stopping worker");
                break;
            }
            if let Some(max_jobs) = self.config.max_jobs {
                if processed >= max_jobs {
                    info!(max_jobs, "reached max jobs limit");
                    break;
                }
            }

            match self.queue.get_pending().await {
                Ok(Some(job)) => {
                    self.process_job(job).await;
                    processed += 1;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = self.clock.sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to poll pending queue");
                    self.clock.sleep(self.config.poll_interval).await;
                }
            }
        }

        info!(processed, "job worker stopped");
        Ok(())
    }

    /// Run the worker until SIGINT or SIGTERM.
    pub async fn run_until_shutdown(&self) -> JobQueueResult<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        self.run(shutdown_rx).await
    }

    /// Process one job: dispatch to its handler and apply the retry policy.
    async fn process_job(&self, mut job: Job) {
        let job_id = job.id.clone();
        let job_type = job.job_type.clone();

        let Some(handler) = self.handlers.get(&job_type) else {
            let msg = format!("no handler registered for job type: {job_type}");
            error!(job_id = %job_id, job_type = %job_type, "{msg}");
            if let Err(e) = self.queue.fail(&job_id, &msg).await {
                error!(job_id = %job_id, error = %e, "failed to mark job failed");
            }
            metrics::record_job_processed(&job_type, JobOutcome::MissingHandler);
            return;
        };

        info!(job_id = %job_id, job_type = %job_type, "processing job");

        if let Err(e) = self
            .queue
            .update_progress(&job_id, 10, Some("starting job processing"))
            .await
        {
            warn!(job_id = %job_id, error = %e, "failed to update progress");
        }

        let start = std::time::Instant::now();
        match handler.handle(&job).await {
            Ok(result) => {
                metrics::record_job_duration(&job_type, start.elapsed());
                match self.queue.complete(&job_id, Some(result)).await {
                    Ok(_) => {
                        info!(job_id = %job_id, "job completed");
                        metrics::record_job_processed(&job_type, JobOutcome::Completed);
                    }
                    Err(e) => {
                        // The index may diverge until cleanup or the next
                        // status change repairs it.
                        error!(job_id = %job_id, error = %e, "failed to mark job completed");
                    }
                }
            }
            Err(handler_err) => {
                metrics::record_job_duration(&job_type, start.elapsed());
                let error_msg = format!("job processing failed: {handler_err}");
                error!(job_id = %job_id, error = %handler_err, "job failed");

                let retry_count = job.retry_count();
                if retry_count < self.config.max_retries {
                    job.record_retry_attempt(&error_msg);
                    info!(
                        job_id = %job_id,
                        attempt = retry_count + 1,
                        max_retries = self.config.max_retries,
                        "retrying job"
                    );
                    metrics::record_retry(&job_type, retry_count + 1);
                    metrics::record_job_processed(&job_type, JobOutcome::Retried);

                    if let Err(e) = self.queue.requeue_for_retry(&job).await {
                        error!(job_id = %job_id, error = %e, "failed to requeue job");
                    }
                    self.clock.sleep(self.config.retry_delay).await;
                } else {
                    let final_msg = format!("{error_msg} (after {retry_count} retries)");
                    if let Err(e) = self.queue.fail(&job_id, &final_msg).await {
                        error!(job_id = %job_id, error = %e, "failed to mark job failed");
                    }
                    metrics::record_job_processed(&job_type, JobOutcome::Failed);
                }
            }
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, initiating shutdown");
        },
    }
}
