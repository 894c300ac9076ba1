//! Test fixtures utilities: load SSE fixtures and drive adapters
#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use pharos::providers::ProviderRequest;
use pharos::streaming::{Transport, TransportResponse, open_delta_stream};
use pharos::{ChatError, DeltaEvent, DeltaKind, ProviderAdapter};
use serde_json::json;

/// Load an `.sse` fixture file and split it into SSE events (separated by blank lines)
pub fn load_sse_fixture_as_bytes(path: &str) -> io::Result<Vec<Bytes>> {
    let raw = std::fs::read_to_string(path)?;
    let normalized = raw.replace("\r\n", "\n");
    let mut out = Vec::new();
    for chunk in normalized.split("\n\n") {
        let s = chunk.trim_end_matches('\n');
        if s.is_empty() {
            continue;
        }
        let mut owned = String::from(s);
        owned.push_str("\n\n");
        out.push(Bytes::from(owned));
    }
    Ok(out)
}

/// Re-split a body into chunks of `size` bytes, ignoring line and UTF-8 boundaries
pub fn rechunk(chunks: &[Bytes], size: usize) -> Vec<Bytes> {
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    joined
        .chunks(size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Transport returning one canned response
pub struct CannedTransport {
    status: u16,
    content_type: Option<String>,
    chunks: Vec<Result<Bytes, ChatError>>,
}

impl CannedTransport {
    pub fn sse(chunks: Vec<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/event-stream".to_string()),
            chunks: chunks.into_iter().map(Ok).collect(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a transport failure after the body chunks
    pub fn then_fail(mut self, message: &str) -> Self {
        self.chunks
            .push(Err(ChatError::StreamError(message.to_string())));
        self
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn send(&self, _request: &ProviderRequest) -> Result<TransportResponse, ChatError> {
        let chunks = self.chunks.clone();
        Ok(TransportResponse {
            status: self.status,
            content_type: self.content_type.clone(),
            body: Box::pin(futures_util::stream::iter(chunks)),
        })
    }
}

pub fn streaming_request() -> ProviderRequest {
    ProviderRequest::new("http://fixture.invalid/chat", json!({}), true)
}

/// Run `transport` through `adapter` and collect every canonical event
pub async fn collect_deltas(transport: CannedTransport, adapter: ProviderAdapter) -> Vec<DeltaEvent> {
    open_delta_stream(Arc::new(transport), streaming_request(), adapter)
        .collect()
        .await
}

pub fn joined(events: &[DeltaEvent], kind: DeltaKind) -> String {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.text.as_str())
        .collect()
}
