//! Redis-backed queue integration tests.
//!
//! These exercise the full persisted layout against a real Redis started via
//! testcontainers. They are ignored by default so the suite passes on hosts
//! without a container runtime; run them with `cargo test -- --ignored`.

use job_queue::{
    JobFilter, JobQueue, JobQueueConfig, JobStatus, JobWorker, RedisJobQueue, SubmitOptions,
    WorkerConfig,
};
use std::sync::Arc;
use std::time::Duration;
use test_utils::TestRedis;
use tokio::sync::watch;

async fn queue(redis: &TestRedis) -> RedisJobQueue {
    RedisJobQueue::connect(JobQueueConfig::new(redis.url()))
        .await
        .expect("failed to connect job queue")
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_full_job_lifecycle() {
    let redis = TestRedis::start().await;
    let queue = queue(&redis).await;

    let job_id = queue
        .submit(
            "echo",
            Some(serde_json::json!({"x": 1})),
            SubmitOptions::new().with_tenant_id("acme").with_user_id("u-1"),
        )
        .await
        .unwrap();

    // Submitted job is pending and indexed.
    let job = queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let pending = queue
        .list(JobFilter::new().with_status(JobStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    // Pop transitions to processing.
    let leased = queue.get_pending().await.unwrap().unwrap();
    assert_eq!(leased.id, job_id);
    assert_eq!(leased.status, JobStatus::Processing);

    // Progress updates clamp.
    queue.update_progress(&job_id, 150, Some("halfway")).await.unwrap();
    let job = queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.progress, 100);

    // Complete stores the result.
    queue
        .complete(&job_id, Some(serde_json::json!({"ok": true})))
        .await
        .unwrap();
    let job = queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(serde_json::json!({"ok": true})));

    let completed = queue
        .list(JobFilter::new().with_status(JobStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_fifo_across_pops() {
    let redis = TestRedis::start().await;
    let queue = queue(&redis).await;

    let first = queue.submit("echo", None, SubmitOptions::new()).await.unwrap();
    let second = queue.submit("echo", None, SubmitOptions::new()).await.unwrap();

    assert_eq!(queue.get_pending().await.unwrap().unwrap().id, first);
    assert_eq!(queue.get_pending().await.unwrap().unwrap().id, second);
    assert!(queue.get_pending().await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_cancel_and_cleanup() {
    let redis = TestRedis::start().await;
    let queue = queue(&redis).await;

    let job_id = queue.submit("echo", None, SubmitOptions::new()).await.unwrap();

    assert!(queue.cancel(&job_id).await.unwrap());
    assert!(!queue.cancel(&job_id).await.unwrap());
    assert!(queue.get_pending().await.unwrap().is_none());

    // Too young for a 1-hour threshold.
    assert_eq!(queue.cleanup_old(Duration::from_secs(3600)).await.unwrap(), 0);
    // Everything terminal is older than zero seconds.
    assert_eq!(queue.cleanup_old(Duration::ZERO).await.unwrap(), 1);
    assert!(queue.get(&job_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_worker_retries_against_redis() {
    let redis = TestRedis::start().await;
    let queue = Arc::new(queue(&redis).await);

    let mut worker = JobWorker::new(
        queue.clone(),
        WorkerConfig::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_retry_delay(Duration::from_millis(10))
            .with_max_retries(2)
            .with_max_jobs(3),
    );
    worker.register_fn("always_fail", |_job| async move {
        Err(job_queue::JobQueueError::Handler("boom".to_string()))
    });

    let job_id = queue
        .submit("always_fail", None, SubmitOptions::new())
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    worker.run(rx).await.unwrap();

    let job = queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count(), 2);
    assert!(job.error.unwrap().contains("(after 2 retries)"));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_health_check() {
    let redis = TestRedis::start().await;
    let queue = queue(&redis).await;
    assert!(queue.health_check().await);
}
