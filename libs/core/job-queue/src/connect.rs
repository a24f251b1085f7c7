//! Redis connection bootstrap.
//!
//! A fresh `ConnectionManager` is verified with a PING before being handed
//! out. Services frequently race their Redis during startup, so
//! `connect_with_retry` re-runs the whole open-and-ping sequence on a
//! doubling, jittered schedule. Once established, the manager reconnects on
//! its own.

use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Bootstrap retry schedule.
#[derive(Debug, Clone)]
pub struct ConnectRetry {
    /// Re-attempts allowed after the first failure.
    pub attempts: u32,

    /// Pause before the first re-attempt; doubles on each one after.
    pub first_delay: Duration,

    /// Ceiling for the doubling pause.
    pub max_delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ConnectRetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of re-attempts.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the pause before the first re-attempt.
    pub fn with_first_delay(mut self, delay: Duration) -> Self {
        self.first_delay = delay;
        self
    }

    /// Pause before re-attempt `attempt` (1-based): doubled from
    /// `first_delay`, capped, then shrunk by up to half so a restarting
    /// fleet does not reconnect in lockstep.
    fn pause_before(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let full = self
            .first_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay);
        full.mul_f64(1.0 - rand::random::<f64>() / 2.0)
    }
}

/// Open a client, build the multiplexed manager, and verify it with a PING.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let manager = ConnectionManager::new(Client::open(url)?).await?;

    let mut probe = manager.clone();
    redis::cmd("PING").query_async::<String>(&mut probe).await?;

    info!(url, "redis connection established");
    Ok(manager)
}

/// Run [`connect`] under the given retry schedule.
pub async fn connect_with_retry(
    url: &str,
    retry: ConnectRetry,
) -> redis::RedisResult<ConnectionManager> {
    let mut attempt: u32 = 0;
    loop {
        match connect(url).await {
            Ok(manager) => return Ok(manager),
            Err(e) if attempt < retry.attempts => {
                attempt += 1;
                let pause = retry.pause_before(attempt);
                warn!(
                    attempt,
                    attempts = retry.attempts,
                    pause_ms = pause.as_millis() as u64,
                    error = %e,
                    "redis connection failed, will retry"
                );
                tokio::time::sleep(pause).await;
            }
            Err(e) => return Err(e),
        }
    }
}
