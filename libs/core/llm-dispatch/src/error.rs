//! Error types for LLM dispatch.
//!
//! This module provides:
//! - `LlmError` - The main error type for provider calls and configuration
//! - `ErrorKind` - Classification used to decide what is retryable

use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur while dispatching LLM calls.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The provider rejected the request because of its own rate limits.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The provider is temporarily unavailable (e.g. 503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The provider returned an internal server error (e.g. 500).
    #[error("internal server error: {0}")]
    Internal(String),

    /// The provider gave up on the request before completing it.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Transport-level connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request timed out client-side.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request was malformed or rejected as invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication or authorization failure.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other provider-reported failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Configuration error (programmer error, fail fast).
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Classify the error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimitExceeded(_) => ErrorKind::RateLimited,
            Self::ServiceUnavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Error classification for retry logic.
///
/// The dispatcher carries a set of kinds it considers retryable; everything
/// else propagates to the caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Provider-side rate limit (429, quota exceeded).
    RateLimited,
    /// Service temporarily unavailable (503).
    Unavailable,
    /// Internal server error (500).
    Internal,
    /// Provider deadline exceeded (504).
    DeadlineExceeded,
    /// Transport connection failure.
    Connection,
    /// Client-side timeout.
    Timeout,
    /// Bad request (400). Never retryable.
    InvalidRequest,
    /// Auth failure (401/403). Never retryable.
    Auth,
    /// Other provider failure.
    Provider,
    /// Configuration error.
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::Auth => "auth",
            Self::Provider => "provider",
            Self::Config => "config",
        }
    }

    /// The default set of kinds considered transient.
    ///
    /// Matches the usual classification of provider failures: rate limits,
    /// unavailability, internal errors, deadlines, connection drops, and
    /// client timeouts are retried; bad requests and auth failures are not.
    pub fn default_retryable() -> HashSet<ErrorKind> {
        HashSet::from([
            Self::RateLimited,
            Self::Unavailable,
            Self::Internal,
            Self::DeadlineExceeded,
            Self::Connection,
            Self::Timeout,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LlmError::RateLimitExceeded("429 from provider".to_string());
        assert_eq!(err.to_string(), "rate limit exceeded: 429 from provider");

        let err = LlmError::Auth("bad api key".to_string());
        assert_eq!(err.to_string(), "authentication failed: bad api key");
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            LlmError::RateLimitExceeded(String::new()).kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            LlmError::ServiceUnavailable(String::new()).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(LlmError::Timeout(String::new()).kind(), ErrorKind::Timeout);
        assert_eq!(
            LlmError::InvalidRequest(String::new()).kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_default_retryable_set() {
        let retryable = ErrorKind::default_retryable();

        assert!(retryable.contains(&ErrorKind::RateLimited));
        assert!(retryable.contains(&ErrorKind::Unavailable));
        assert!(retryable.contains(&ErrorKind::Internal));
        assert!(retryable.contains(&ErrorKind::DeadlineExceeded));
        assert!(retryable.contains(&ErrorKind::Connection));
        assert!(retryable.contains(&ErrorKind::Timeout));

        assert!(!retryable.contains(&ErrorKind::InvalidRequest));
        assert!(!retryable.contains(&ErrorKind::Auth));
        assert!(!retryable.contains(&ErrorKind::Provider));
        assert!(!retryable.contains(&ErrorKind::Config));
    }
}
