//! LLM Dispatch - Rate-Limited, Retrying Provider Calls
//!
//! A reusable layer for calling LLM providers with:
//! - Per-model requests-per-minute throttling (sliding 60s window)
//! - Minimum-interval pacing between consecutive requests
//! - Automatic retry with exponential/linear/fixed backoff and jitter
//! - Caller-configured retryable error classification
//! - Fail-open rate limiter acquisition (a broken limiter never fails a call)
//!
//! # Architecture
//!
//! ```text
//! LlmDispatcher::chat()
//!   ↓ (acquire slot, ≤5s ceiling, fail-open)
//! RateLimiter
//!   ↓ (retry-wrapped, once per accepted request)
//! retry_async(provider.chat())
//!   ↓
//! LlmProvider (vendor adapter)
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm_dispatch::{DispatcherConfig, LlmDispatcher, LlmProvider};
//!
//! let config = DispatcherConfig::new("gemini-2.5-flash");
//! let dispatcher = LlmDispatcher::new(Arc::new(provider), config)?;
//!
//! let response = dispatcher.chat(&request).await?;
//! ```

mod config;
mod dispatcher;
mod error;
mod rate_limiter;
mod retry;

pub use config::{DispatcherConfig, ModelRateTable, RateLimitConfig, DEFAULT_MODEL_RPM};
pub use dispatcher::{
    ChatMessage, ChatRequest, ChatResponse, LlmDispatcher, LlmProvider, ToolCall, ToolSpec, Usage,
};
pub use error::{ErrorKind, LlmError};
pub use rate_limiter::RateLimiter;
pub use retry::{
    retry_async, retry_async_with_clock, retry_blocking, BackoffStrategy, RetryConfig,
};

/// Result type alias for dispatch operations.
pub type LlmResult<T> = Result<T, LlmError>;
