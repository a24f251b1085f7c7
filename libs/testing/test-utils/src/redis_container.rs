//! Redis test infrastructure
//!
//! `TestRedis` starts a throwaway Redis container and exposes its URL, which
//! is what the job queue's `connect` path wants: the code under test builds
//! its own connections exactly as it would in production.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// A Redis container scoped to one test.
///
/// Dropping the fixture tears the container down.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::TestRedis;
///
/// #[tokio::test]
/// async fn queue_roundtrip() {
///     let redis = TestRedis::start().await;
///     let queue = RedisJobQueue::connect(JobQueueConfig::new(redis.url()))
///         .await
///         .unwrap();
///     // ...
/// }
/// ```
pub struct TestRedis {
    // Held only to keep the container running for the fixture's lifetime.
    _container: ContainerAsync<Redis>,
    url: String,
}

impl TestRedis {
    /// Start a fresh single-node Redis and wait for it to accept
    /// connections.
    pub async fn start() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("redis container failed to start");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("redis port was not mapped");

        tracing::info!(port, "started throwaway redis");

        Self {
            url: format!("redis://127.0.0.1:{port}"),
            _container: container,
        }
    }

    /// The connection URL to hand to code under test.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// A client for direct command assertions against the container.
    pub fn client(&self) -> redis::Client {
        redis::Client::open(self.url.as_str()).expect("container url was not a valid redis url")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_container_serves_commands() {
        let redis = TestRedis::start().await;
        let mut conn = redis
            .client()
            .get_multiplexed_async_connection()
            .await
            .unwrap();

        conn.set_ex::<_, _, ()>("probe", "alive", 30).await.unwrap();
        let value: String = conn.get("probe").await.unwrap();
        assert_eq!(value, "alive");

        conn.rpush::<_, _, ()>("probe_list", "a").await.unwrap();
        conn.rpush::<_, _, ()>("probe_list", "b").await.unwrap();
        let head: Option<String> = conn.lpop("probe_list", None).await.unwrap();
        assert_eq!(head.as_deref(), Some("a"));
    }
}
