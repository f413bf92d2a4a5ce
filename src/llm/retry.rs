//! Retry decoration for LLM calls.
//!
//! Rate limiting is the one transient failure worth retrying at the
//! transport level; everything else the pipeline degrades around. The
//! decorator retries only 429 responses, with exponential backoff plus the
//! `retryDelay` hint Google APIs put in their error details.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{LLM, LLMError};

/// Wraps a boxed LLM with rate-limit-aware retries.
pub struct RetryableLLM {
    inner: Box<dyn LLM>,
    max_attempts: usize,
}

impl RetryableLLM {
    /// Creates a new `RetryableLLM`.
    ///
    /// # Arguments
    ///
    /// * `inner` - The LLM implementation to wrap.
    /// * `max_attempts` - Maximum number of retry attempts (0 means no retries).
    pub fn new(inner: Box<dyn LLM>, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }

    /// Only 429 (rate limit) errors are considered retryable.
    fn should_retry(error: &LLMError) -> bool {
        let error_str = error.to_string();

        let json_str = error_str
            .strip_prefix("Failed to prompt the model: ")
            .unwrap_or(&error_str);

        if let Ok(json) = serde_json::from_str::<Value>(json_str) {
            if let Some(code) = json["error"]["code"].as_i64() {
                return code == 429;
            }
        }
        false
    }

    /// Waits for the `retryDelay` a Google API error response suggests, if any.
    async fn handle_retry_delay(error: &LLMError) {
        let error_str = error.to_string();

        let json_str = error_str
            .strip_prefix("Failed to prompt the model: ")
            .unwrap_or(&error_str);

        if let Ok(json) = serde_json::from_str::<Value>(json_str) {
            if let Some(details) = json["error"]["details"].as_array() {
                for detail in details {
                    if detail["@type"].as_str() == Some("type.googleapis.com/google.rpc.RetryInfo")
                    {
                        if let Some(retry_delay) = detail["retryDelay"].as_str() {
                            if let Ok(duration) = humantime::parse_duration(retry_delay) {
                                tokio::time::sleep(duration).await;
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl LLM for RetryableLLM {
    async fn prompt(&mut self, prompt: String) -> Result<String, LLMError> {
        let mut last_error = None;
        let base_delay = Duration::from_millis(1000);

        for attempt in 0..=self.max_attempts {
            match self.inner.prompt(prompt.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    let error = last_error.as_ref().unwrap();

                    // Don't retry on the last attempt or if error is not retryable
                    if attempt == self.max_attempts || !Self::should_retry(error) {
                        break;
                    }

                    Self::handle_retry_delay(error).await;

                    // Exponential backoff with simple jitter
                    let delay = base_delay * (2_u32.pow(attempt as u32));
                    let jitter_ms = (attempt as u64 * 50) % 200;
                    let jitter_delay = Duration::from_millis(delay.as_millis() as u64 + jitter_ms);
                    tokio::time::sleep(jitter_delay).await;
                }
            }
        }

        Err(last_error.unwrap())
    }
}
