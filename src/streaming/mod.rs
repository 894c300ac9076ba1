//! Stream ingestion
//!
//! Transport bytes flow through the [`LineBuffer`] into a provider adapter
//! and come out as canonical [`DeltaEvent`]s. The stream returned by
//! [`open_delta_stream`] never fails: transport and HTTP failures are
//! reported as a final `error` event, and it ends after the first
//! terminal event.

pub mod line_buffer;
pub mod session;
pub mod transport;

pub use line_buffer::LineBuffer;
pub use session::{StreamSession, annotate_error};
pub use transport::{ByteStream, HttpTransport, Transport, TransportReader, TransportResponse};

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::Value;

use crate::error::classify_http_error;
use crate::providers::{ProviderAdapter, ProviderRequest};
use crate::types::DeltaEvent;

/// Canonical event stream for one request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = DeltaEvent> + Send>>;

/// Run one frame through the adapter, draining any queued second channel.
fn frame_events(adapter: &mut ProviderAdapter, frame: &str) -> Vec<DeltaEvent> {
    tracing::trace!(provider = adapter.family(), frame, "Stream frame");
    let mut events = Vec::new();
    if let Some(event) = adapter.parse(frame) {
        events.push(event);
    }
    while let Some(event) = adapter.take_pending() {
        events.push(event);
    }
    events
}

fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
}

/// Send `request` and decode the response with `adapter`.
pub fn open_delta_stream(
    transport: Arc<dyn Transport>,
    request: ProviderRequest,
    mut adapter: ProviderAdapter,
) -> DeltaStream {
    Box::pin(async_stream::stream! {
        let response = match transport.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider = adapter.family(), error = %e, "Request failed");
                yield DeltaEvent::error(e.user_message(), e.status_code());
                return;
            }
        };

        let status = response.status;
        let content_type = response.content_type.clone();

        if !response.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_http_error(status, content_type.as_deref(), &body);
            tracing::warn!(provider = adapter.family(), status, error = %error, "Provider returned an error status");
            yield DeltaEvent::error(error.user_message(), Some(status));
            return;
        }
        if response.is_html() {
            tracing::warn!(provider = adapter.family(), status, "Provider returned an HTML page");
            yield DeltaEvent::error(
                format!("Provider returned an HTML page instead of a response (status {status})"),
                Some(status),
            );
            return;
        }

        let buffered = !request.stream
            || (!is_event_stream(content_type.as_deref())
                && content_type.as_deref().is_some_and(|ct| ct.contains("application/json")));

        if buffered {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    yield DeltaEvent::error(e.user_message(), None);
                    return;
                }
            };
            match serde_json::from_str::<Value>(&body) {
                Ok(value) => {
                    for event in adapter.parse_complete(&value) {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = adapter.family(), error = %e, "Unparseable response body");
                    yield DeltaEvent::error(format!("Could not parse provider response: {e}"), None);
                }
            }
            return;
        }

        let mut reader = response.into_reader();
        let mut lines = LineBuffer::new();
        while let Some(chunk) = reader.next_chunk().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(provider = adapter.family(), error = %e, "Stream interrupted");
                    yield DeltaEvent::error(e.user_message(), None);
                    return;
                }
            };
            for frame in lines.feed(&bytes) {
                for event in frame_events(&mut adapter, &frame) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }

        if let Some(frame) = lines.finish() {
            for event in frame_events(&mut adapter, &frame) {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }
        }
        yield adapter.finish();
    })
}
