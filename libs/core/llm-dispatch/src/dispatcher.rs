//! The dispatcher: rate limiting and retry composed around a provider.
//!
//! This module provides:
//! - `LlmProvider` - the seam implemented by vendor adapters
//! - `ChatRequest` / `ChatResponse` - the provider-agnostic call shape
//! - `LlmDispatcher` - acquires a rate limiter slot (fail-open, bounded
//!   wait), then runs the retry-wrapped provider call
//!
//! The rate limiter is acquired once per user-facing call, not once per
//! retry attempt: the limit applies to accepted requests, not attempts.

use crate::config::{DispatcherConfig, RateLimitConfig};
use crate::error::LlmError;
use crate::rate_limiter::RateLimiter;
use crate::retry::retry_async_with_clock;
use async_trait::async_trait;
use core_clock::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A single chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// A provider-agnostic chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    /// A single-turn request from one user message.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            system: None,
            tools: Vec::new(),
        }
    }
}

/// The provider's answer: content, optional tool calls, usage counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Usage,
}

/// Seam implemented by vendor adapters.
///
/// The dispatcher only requires a chat call that returns content, an
/// optional tool-call list, and usage counts, and that failures arrive as
/// classifiable [`LlmError`]s.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform one chat call against the vendor API.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Rate-limited, retrying wrapper around a provider.
///
/// One dispatcher is constructed per (provider, model) pair; its rate
/// limiter is sized from the model table at construction.
pub struct LlmDispatcher {
    provider: Arc<dyn LlmProvider>,
    limiter: RateLimiter,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
}

impl LlmDispatcher {
    /// Create a dispatcher. Fails fast on configuration errors.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: DispatcherConfig,
    ) -> Result<Self, LlmError> {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a dispatcher with an injected clock for the rate limiter and
    /// the retry backoff.
    pub fn with_clock(
        provider: Arc<dyn LlmProvider>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LlmError> {
        config.validate()?;

        let rpm = config.rate_table.rpm_for(&config.model);
        let limit = RateLimitConfig::for_rpm(rpm);
        debug!(
            provider = provider.name(),
            model = %config.model,
            rpm = limit.requests_per_minute,
            rps = limit.requests_per_second,
            "initialized dispatcher rate limiter"
        );

        Ok(Self {
            provider,
            limiter: RateLimiter::with_clock(limit, clock.clone()),
            config,
            clock,
        })
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat request through the rate limiter and retry wrapper.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.acquire_slot().await;

        let retry_on = &self.config.retry_on;
        let result = retry_async_with_clock(
            &self.config.retry,
            self.clock.as_ref(),
            |err: &LlmError| retry_on.contains(&err.kind()),
            || self.provider.chat(request),
        )
        .await;

        match result {
            Ok(response) => Ok(response),
            Err(err) => {
                // Retryable failures already produced per-attempt warnings,
                // so the final log stays terse; non-retryable failures get
                // the full detail.
                if retry_on.contains(&err.kind()) {
                    error!(
                        provider = self.provider.name(),
                        model = %self.config.model,
                        error = %err,
                        "chat failed after all retries"
                    );
                } else {
                    error!(
                        provider = self.provider.name(),
                        model = %self.config.model,
                        error = ?err,
                        "chat failed with non-retryable error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Acquire a rate limiter slot under the configured ceiling.
    ///
    /// Rate limiter trouble never propagates to the caller: on timeout the
    /// call proceeds un-throttled with a warning.
    async fn acquire_slot(&self) {
        let acquired =
            tokio::time::timeout(self.config.acquire_timeout, self.limiter.acquire()).await;
        if acquired.is_err() {
            warn!(
                provider = self.provider.name(),
                model = %self.config.model,
                timeout_ms = self.config.acquire_timeout.as_millis() as u64,
                "rate limiter acquisition timed out, proceeding without throttle"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRateTable;
    use crate::retry::RetryConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Provider that fails a configured number of times before succeeding.
    struct FlakyProvider {
        calls: AtomicU32,
        failures: u32,
        error: fn(String) -> LlmError,
    }

    impl FlakyProvider {
        fn new(failures: u32, error: fn(String) -> LlmError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)(format!("induced failure {call}")))
            } else {
                Ok(ChatResponse {
                    content: Some("hello".to_string()),
                    ..Default::default()
                })
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter_factor(0.0)
    }

    fn open_table() -> ModelRateTable {
        // High ceiling so dispatcher tests are not paced.
        ModelRateTable::from_entries([("test-model", 6000u32)])
    }

    #[tokio::test]
    async fn test_chat_retries_transient_failures() {
        let provider = Arc::new(FlakyProvider::new(2, LlmError::ServiceUnavailable));
        let config = DispatcherConfig::new("test-model")
            .with_rate_table(open_table())
            .with_retry(fast_retry(3));
        let dispatcher = LlmDispatcher::new(provider.clone(), config).unwrap();

        let response = dispatcher
            .chat(&ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_chat_propagates_non_retryable_without_retry() {
        let provider = Arc::new(FlakyProvider::new(u32::MAX, LlmError::InvalidRequest));
        let config = DispatcherConfig::new("test-model")
            .with_rate_table(open_table())
            .with_retry(fast_retry(3));
        let dispatcher = LlmDispatcher::new(provider.clone(), config).unwrap();

        let err = dispatcher
            .chat(&ChatRequest::from_prompt("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidRequest(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_chat_exhausts_retries_and_propagates() {
        let provider = Arc::new(FlakyProvider::new(u32::MAX, LlmError::RateLimitExceeded));
        let config = DispatcherConfig::new("test-model")
            .with_rate_table(open_table())
            .with_retry(fast_retry(2));
        let dispatcher = LlmDispatcher::new(provider.clone(), config).unwrap();

        let err = dispatcher
            .chat(&ChatRequest::from_prompt("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::RateLimitExceeded(_)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_limiter_acquired_once_per_call_not_per_retry() {
        // RPM 2 with a flaky provider: the retries of a single call must not
        // consume additional limiter slots, so two calls (one of them
        // retried) fit the window without the second blocking on the
        // acquire ceiling.
        let clock = Arc::new(core_clock::ManualClock::new());
        let provider = Arc::new(FlakyProvider::new(1, LlmError::ServiceUnavailable));
        let config = DispatcherConfig::new("tiny-model")
            .with_rate_table(ModelRateTable::from_entries([("tiny-model", 2u32)]))
            .with_retry(fast_retry(3))
            .with_acquire_timeout(Duration::from_millis(200));
        let dispatcher = LlmDispatcher::with_clock(provider.clone(), config, clock).unwrap();

        let request = ChatRequest::from_prompt("hi");
        dispatcher.chat(&request).await.unwrap();
        dispatcher.chat(&request).await.unwrap();

        // One retry happened, but only two limiter slots were used.
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let provider = Arc::new(FlakyProvider::new(0, LlmError::Internal));
        let config = DispatcherConfig::new("test-model")
            .with_retry(RetryConfig::new().with_jitter_factor(2.0));

        assert!(matches!(
            LlmDispatcher::new(provider, config),
            Err(LlmError::Config(_))
        ));
    }
}
