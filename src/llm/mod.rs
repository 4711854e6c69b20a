//! Model invocation layer
//!
//! Talks to an OpenAI-compatible chat completions endpoint and falls over to
//! alternate model ids when a call fails with a retryable error.

pub mod http;
pub mod invoker;
pub mod sse;

pub use http::HttpTransport;
pub use invoker::{InvokeOptions, Invocation, ModelInvoker, RetryPolicy};

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body posted to `{base_url}/chat/completions`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

/// Errors from a model call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Model stream failed: {0}")]
    Stream(String),

    #[error("No API key configured (set {0} or add a token to the secrets file)")]
    MissingApiKey(String),

    #[error("Model call failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<ModelError> },
}

impl ModelError {
    /// HTTP status of the failure, looking through exhaustion
    pub fn status(&self) -> Option<u16> {
        match self {
            ModelError::Status { status, .. } => Some(*status),
            ModelError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Whether trying again (on the next model id) may succeed
    pub fn is_retryable(&self, retryable_statuses: &[u16]) -> bool {
        match self {
            ModelError::Status { status, .. } => retryable_statuses.contains(status),
            ModelError::Network(_) => true,
            _ => false,
        }
    }
}

/// Incremental text deltas of a streamed reply
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// A reply: either the full text or a stream of deltas
pub enum ModelReply {
    Complete(String),
    Stream(TextStream),
}

impl fmt::Debug for ModelReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelReply::Complete(text) => f.debug_tuple("Complete").field(&text.len()).finish(),
            ModelReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Sends one request to one model id
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;
}
