//! Error types for job queue operations.

use thiserror::Error;

/// Errors that can occur during queue operations.
///
/// Not-found and forbidden-transition cases are not errors: operations
/// return `Ok(None)` / `Ok(false)` for those, per the queue contract.
#[derive(Error, Debug)]
pub enum JobQueueError {
    /// Redis connection or command error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (programmer error, fail fast).
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure raised by a job handler.
    #[error("handler error: {0}")]
    Handler(String),
}

/// Result type alias for queue operations.
pub type JobQueueResult<T> = Result<T, JobQueueError>;
