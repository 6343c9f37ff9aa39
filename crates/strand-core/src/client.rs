//! Streaming HTTP client for Ollama-compatible backends.

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stream::{GenerationStream, StreamError, StreamErrorKind, StreamResult};

/// Standard User-Agent header for strand API requests.
pub const USER_AGENT: &str = concat!("strand/", env!("CARGO_PKG_VERSION"));

/// Default backend address when neither env nor config overrides it.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Chat roles accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message with owned data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Boxed response-body stream handed to the engine.
pub type ByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Client for one Ollama-compatible backend.
///
/// Each call starts one generation and hands back one engine instance
/// that exclusively owns the response body for its lifetime.
pub struct OllamaClient {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Starts a streaming chat completion over the message history
    /// (`/api/chat`, records in the `message.content` shape).
    ///
    /// # Errors
    /// Fails before streaming begins on connection errors or a
    /// non-success upstream status.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
    ) -> StreamResult<GenerationStream<ByteStream>> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        self.send_streaming_request(&url, &request).await
    }

    /// Starts a streaming completion for a bare prompt
    /// (`/api/generate`, records in the `response` shape).
    ///
    /// # Errors
    /// Fails before streaming begins on connection errors or a
    /// non-success upstream status.
    pub async fn generate(&self, prompt: &str) -> StreamResult<GenerationStream<ByteStream>> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };
        self.send_streaming_request(&url, &request).await
    }

    async fn send_streaming_request<T: Serialize>(
        &self,
        url: &str,
        request: &T,
    ) -> StreamResult<GenerationStream<ByteStream>> {
        debug!(url, model = %self.model, "dispatching streaming generation request");
        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(StreamError::http_status(status.as_u16(), &error_body));
        }

        let body: ByteStream = response.bytes_stream().boxed();
        GenerationStream::from_body(Some(body))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> StreamError {
    if e.is_timeout() {
        StreamError::transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        StreamError::transport(format!("connection failed: {e}"))
    } else {
        StreamError::new(StreamErrorKind::HttpStatus, format!("request error: {e}"))
    }
}
