//! Transport seam
//!
//! The engine only needs "send one request, read the body chunk by chunk".
//! `HttpTransport` is the reqwest implementation; tests plug in their own.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::config::HttpConfig;
use crate::error::ChatError;
use crate::providers::ProviderRequest;

/// Response body as a stream of raw byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Status line and body of a provider response.
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body looks like an HTML page rather than JSON/SSE.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    pub fn into_reader(self) -> TransportReader {
        TransportReader { body: self.body }
    }

    /// Read the whole body as text.
    pub async fn text(self) -> Result<String, ChatError> {
        let bytes = self.into_reader().read_to_end().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Pull-style reader over a response body, with no provider knowledge.
pub struct TransportReader {
    body: ByteStream,
}

impl TransportReader {
    pub fn new(body: ByteStream) -> Self {
        Self { body }
    }

    /// Next raw chunk, or `None` at end of body.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, ChatError>> {
        self.body.next().await
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, ChatError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// Sends one provider request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProviderRequest) -> Result<TransportResponse, ChatError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            ChatError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProviderRequest) -> Result<TransportResponse, ChatError> {
        let payload = serde_json::to_vec(&request.body)?;
        let mut builder = self.client.post(&request.url).body(payload);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::HttpError(format!("Failed to send request: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::StreamError(format!("Stream error: {e}"))));

        Ok(TransportResponse {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}
