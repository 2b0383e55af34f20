//! Generation service client
//!
//! Posts the conversation to the upstream generation service and hands back
//! its response body as a byte stream in the tagged wire format.

use crate::upstream::error::UpstreamError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

/// Longest slice of an error body that is logged or kept
const ERROR_BODY_SNIPPET_CHARS: usize = 200;

/// Upstream response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// One message as the generation service expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamMessage {
    /// "user" or "assistant"
    pub role: String,
    /// Plain text content
    pub content: String,
}

/// Body of the upstream generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Full conversation so far, oldest first
    pub messages: Vec<UpstreamMessage>,
    /// Correlation token
    pub conversation_id: String,
    /// Owner on whose behalf the call runs
    pub owner_id: String,
    /// Preferred model, if the client asked for one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Whether the conversation carries an attached document
    pub has_document: bool,
}

/// Something that can start a generation and stream back the wire format
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Start a generation
    ///
    /// Returns once the service has accepted the request and at least one
    /// byte of body is available.
    async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, UpstreamError>;
}

/// HTTP implementation of [`GenerationClient`]
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    client: reqwest::Client,
    url: String,
    response_timeout: Option<Duration>,
}

impl HttpGenerationClient {
    /// Create a client posting to `url`
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (connection pooling)
    /// * `url` - Full URL of the generation endpoint
    /// * `response_timeout` - Optional deadline for the response headers; the body itself is unbounded
    pub fn new(client: reqwest::Client, url: impl Into<String>, response_timeout: Option<Duration>) -> Self {
        Self {
            client,
            url: url.into(),
            response_timeout,
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, UpstreamError> {
        tracing::debug!(
            url = %self.url,
            conversation_id = %request.conversation_id,
            message_count = request.messages.len(),
            "Calling generation service"
        );

        let send = self.client.post(&self.url).json(request).send();
        let response = match self.response_timeout {
            Some(limit) => timeout(limit, send)
                .await
                .map_err(|_| UpstreamError::Timeout(limit.as_secs()))??,
            None => send.await?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect();

            tracing::error!(
                status_code = status.as_u16(),
                error_body = %snippet,
                "Generation service returned error status"
            );

            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let mut body = response.bytes_stream();
        let first = loop {
            match body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => return Err(UpstreamError::Request(e)),
                None => {
                    tracing::error!("Generation service returned an empty body");
                    return Err(UpstreamError::EmptyBody);
                }
            }
        };

        let rest = body.map(|chunk| chunk.map_err(UpstreamError::from));
        Ok(Box::pin(stream::once(async move { Ok(first) }).chain(rest)))
    }
}
