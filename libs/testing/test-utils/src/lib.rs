//! Shared test utilities
//!
//! Reusable test infrastructure for the workspace:
//! - `TestRedis`: throwaway Redis container exposing its connection URL
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::TestRedis;
//!
//! #[tokio::test]
//! async fn my_redis_test() {
//!     let redis = TestRedis::start().await;
//!     let queue = RedisJobQueue::connect(JobQueueConfig::new(redis.url()))
//!         .await
//!         .unwrap();
//! }
//! ```

mod redis_container;

pub use redis_container::TestRedis;
