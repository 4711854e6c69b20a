// HTTP transport for OpenAI-compatible chat completion endpoints

use super::sse::{completion_text, SseDecoder, SseItem};
use super::{ChatTransport, ModelError, ModelReply, ModelRequest, TextStream};
use crate::config::ModelSettings;
use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

/// Posts chat requests to `{base_url}/chat/completions`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    /// Whole-request limit for complete replies; streams use it as an idle limit
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(timeout)
            .build()
            .map_err(|e| ModelError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    /// Build a transport from model settings and a resolved API key
    pub fn from_settings(
        settings: &ModelSettings,
        api_key: Option<String>,
    ) -> Result<Self, ModelError> {
        if api_key.is_none() && settings.require_api_key {
            return Err(ModelError::MissingApiKey(settings.api_key_env.clone()));
        }
        Self::new(
            settings.base_url.clone(),
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn network_error(e: reqwest::Error) -> ModelError {
    if e.is_decode() {
        ModelError::Decode(e.to_string())
    } else {
        ModelError::Network(e.to_string())
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        log::debug!(
            "POST {} model={} stream={}",
            self.endpoint(),
            request.model,
            request.stream
        );

        let mut builder = self.client.post(self.endpoint()).json(request);
        if !request.stream {
            builder = builder.timeout(self.timeout);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(ModelError::Status {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        if request.stream {
            return Ok(ModelReply::Stream(text_stream(response.bytes_stream())));
        }

        let body: serde_json::Value = response.json().await.map_err(network_error)?;
        completion_text(&body)
            .map(ModelReply::Complete)
            .ok_or_else(|| ModelError::Decode("Response has no choices[0].message.content".to_string()))
    }
}

struct StreamState<B> {
    bytes: Pin<Box<B>>,
    decoder: SseDecoder,
    pending: VecDeque<SseItem>,
    done: bool,
}

/// Turn a raw SSE body into a stream of text deltas
pub fn text_stream<B, C>(bytes: B) -> TextStream
where
    B: Stream<Item = Result<C, reqwest::Error>> + Send + 'static,
    C: AsRef<[u8]> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                match item {
                    SseItem::Delta(text) => return Some((Ok(text), state)),
                    SseItem::Done => return None,
                    SseItem::Error(message) => {
                        state.pending.clear();
                        state.done = true;
                        return Some((Err(ModelError::Stream(message)), state));
                    }
                }
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let items = state.decoder.push(chunk.as_ref());
                    state.pending.extend(items);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ModelError::Stream(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    let items = state.decoder.finish();
                    state.pending.extend(items);
                }
            }
        }
    }))
}
