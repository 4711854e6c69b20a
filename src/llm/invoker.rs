// Model invoker with fallback retry across a chain of model ids

use super::{ChatMessage, ChatTransport, ModelError, ModelReply, ModelRequest};
use crate::config::RetrySettings;
use std::sync::Arc;
use std::time::Duration;

/// Retry behaviour for model calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Whether to fall over to `fallback_models` at all
    pub enabled: bool,
    /// Model ids tried after the primary, in order
    pub fallback_models: Vec<String>,
    /// HTTP statuses worth retrying
    pub retryable_statuses: Vec<u16>,
    /// Upper bound on attempts across the whole chain
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            enabled: settings.enabled,
            fallback_models: settings.fallback_models.clone(),
            retryable_statuses: settings.retryable_statuses.clone(),
            max_attempts: settings.max_attempts.max(1),
            base_backoff_ms: settings.base_backoff_ms,
            max_backoff_ms: settings.max_backoff_ms,
        }
    }

    /// Model ids to try, primary first
    pub fn model_chain(&self, primary: &str) -> Vec<String> {
        let mut chain = vec![primary.to_string()];
        if self.enabled {
            for model in &self.fallback_models {
                if !chain.contains(model) {
                    chain.push(model.clone());
                }
            }
        }
        chain.truncate(self.max_attempts as usize);
        chain
    }

    /// Delay before the given retry (1-based), doubling each time up to the cap
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let delay = self
            .base_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl InvokeOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            stream: true,
        }
    }
}

/// A successful call
#[derive(Debug)]
pub struct Invocation {
    /// Model id that answered
    pub model: String,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub reply: ModelReply,
}

/// Invokes the model through a transport, retrying on the fallback chain
#[derive(Clone)]
pub struct ModelInvoker {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
}

impl ModelInvoker {
    pub fn new(transport: Arc<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call the model, retrying retryable failures against the next model id.
    ///
    /// Only establishing the call is retried; once a stream is handed back,
    /// its failures belong to the caller.
    pub async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        options: &InvokeOptions,
    ) -> Result<Invocation, ModelError> {
        let chain = self.policy.model_chain(&options.model);
        let mut last_error = None;
        let mut attempts = 0u32;

        for (index, model) in chain.iter().enumerate() {
            if index > 0 {
                let delay = self.policy.backoff(index as u32);
                log::info!(
                    "Retrying with fallback model {} in {}ms",
                    model,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            attempts += 1;
            let request = ModelRequest {
                model: model.clone(),
                messages: messages.clone(),
                temperature: options.temperature,
                max_tokens: options.max_tokens,
                stream: options.stream,
            };

            match self.transport.send(&request).await {
                Ok(reply) => {
                    if attempts > 1 {
                        log::info!("Model {} succeeded after {} attempts", model, attempts);
                    }
                    return Ok(Invocation {
                        model: model.clone(),
                        attempts,
                        reply,
                    });
                }
                Err(e) if e.is_retryable(&self.policy.retryable_statuses) => {
                    log::warn!("Model {} failed with retryable error: {}", model, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    log::error!("Model {} failed: {}", model, e);
                    return Err(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| ModelError::Network("no model attempted".to_string()));
        if attempts > 1 {
            Err(ModelError::Exhausted {
                attempts,
                last: Box::new(last),
            })
        } else {
            Err(last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(enabled: bool, fallbacks: &[&str]) -> RetryPolicy {
        RetryPolicy {
            enabled,
            fallback_models: fallbacks.iter().map(|s| s.to_string()).collect(),
            retryable_statuses: vec![429, 502, 503, 504],
            max_attempts: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 250,
        }
    }

    #[test]
    fn test_model_chain() {
        assert_eq!(policy(true, &["b"]).model_chain("a"), vec!["a", "b"]);
        assert_eq!(policy(false, &["b"]).model_chain("a"), vec!["a"]);
        assert_eq!(policy(true, &["a", "b"]).model_chain("a"), vec!["a", "b"]);
        assert_eq!(
            policy(true, &["b", "c", "d"]).model_chain("a"),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy(true, &[]);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(250));
        assert_eq!(policy.backoff(40), Duration::from_millis(250));
    }
}
