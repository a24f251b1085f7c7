//! Job Queue - Persistent Jobs with a Background Worker Pool
//!
//! A reusable library for long-running work items with:
//! - Durable job records in Redis with TTL-bounded lifetimes
//! - FIFO dispatch through an atomic pending-list pop
//! - Status, tenant, and user indices for list queries
//! - Automatic retry with bounded attempts and requeueing
//! - Progress tracking and cooperative cancellation
//! - Graceful shutdown handling (SIGINT/SIGTERM between jobs)
//! - An in-memory backend for tests and single-process embedding
//!
//! # Architecture
//!
//! ```text
//! submit()
//!   ↓ (RPUSH {prefix}queue:pending)
//! Redis record + indices
//!   ↓ (LPOP, atomic)
//! JobWorker
//!   ↓ (registry lookup by job type)
//! JobHandler
//!   ↓ (result / error)
//! complete() | requeue_for_retry() | fail()
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use job_queue::{JobQueue, JobQueueConfig, JobWorker, RedisJobQueue, WorkerConfig};
//!
//! // 1. Connect the queue
//! let queue = Arc::new(RedisJobQueue::connect(JobQueueConfig::new(redis_url)).await?);
//!
//! // 2. Register handlers
//! let mut worker = JobWorker::new(queue.clone(), WorkerConfig::default());
//! worker.register_fn("summarize", |job| async move {
//!     Ok(serde_json::json!({ "summary": "..." }))
//! });
//!
//! // 3. Run until SIGINT/SIGTERM
//! worker.run_until_shutdown().await?;
//! ```

mod config;
mod connect;
mod error;
mod job;
mod memory;
pub mod metrics;
mod queue;
mod store;
mod worker;

// Re-export all public types
pub use config::{JobQueueConfig, WorkerConfig};
pub use connect::{connect, connect_with_retry, ConnectRetry};
pub use error::{JobQueueError, JobQueueResult};
pub use job::{Job, JobFilter, JobStatus, SubmitOptions, LAST_ERROR_KEY, RETRY_COUNT_KEY};
pub use memory::InMemoryJobQueue;
pub use queue::JobQueue;
pub use store::RedisJobQueue;
pub use worker::{JobHandler, JobWorker};
