//! Anthropic Messages API event decoding

use serde::Deserialize;
use serde_json::Value;

use crate::providers::decode_frame;
use crate::types::{DeltaEvent, Usage};

/// Anthropic stream event
/// Only the fields the delta pipeline consumes are modelled.
#[derive(Debug, Clone, Deserialize)]
struct AnthropicStreamEvent {
    r#type: String,
    #[serde(default)]
    message: Option<AnthropicMessage>,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    content_block: Option<AnthropicContent>,
    #[serde(default)]
    error: Option<AnthropicError>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicMessage {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

/// Delta subtypes: `text_delta`, `thinking_delta`, `input_json_delta`, `signature_delta`
#[derive(Debug, Clone, Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type", default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl From<AnthropicUsage> for Usage {
    fn from(u: AnthropicUsage) -> Self {
        Usage::new(u.input_tokens.unwrap_or(0), u.output_tokens.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn error_status(error_type: Option<&str>) -> Option<u16> {
    match error_type? {
        "overloaded_error" => Some(529),
        "rate_limit_error" => Some(429),
        "api_error" => Some(500),
        "authentication_error" => Some(401),
        "permission_error" => Some(403),
        "not_found_error" => Some(404),
        "invalid_request_error" => Some(400),
        _ => None,
    }
}

/// Stateful decoder for one Anthropic stream.
#[derive(Debug, Clone, Default)]
pub struct AnthropicEventParser {
    usage: Option<Usage>,
}

impl AnthropicEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_usage(&mut self, usage: AnthropicUsage) {
        let usage = Usage::from(usage);
        match self.usage.as_mut() {
            Some(existing) => existing.merge(usage),
            None => self.usage = Some(usage),
        }
    }

    pub fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        let value = decode_frame("anthropic", frame)?;
        let event: AnthropicStreamEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(provider = "anthropic", error = %e, "Unrecognised event shape");
                return None;
            }
        };

        match event.r#type.as_str() {
            "message_start" => {
                if let Some(usage) = event.message.and_then(|m| m.usage) {
                    self.record_usage(usage);
                }
                None
            }
            "content_block_start" => {
                let block = event.content_block?;
                match block.content_type.as_str() {
                    "text" => block.text.filter(|t| !t.is_empty()).map(DeltaEvent::content),
                    "thinking" => block
                        .thinking
                        .filter(|t| !t.is_empty())
                        .map(DeltaEvent::reasoning),
                    _ => None,
                }
            }
            "content_block_delta" => {
                let delta = event.delta?;
                match delta.delta_type.as_deref() {
                    Some("thinking_delta") => delta
                        .thinking
                        .filter(|t| !t.is_empty())
                        .map(DeltaEvent::reasoning),
                    Some("text_delta") | None => {
                        delta.text.filter(|t| !t.is_empty()).map(DeltaEvent::content)
                    }
                    _ => None,
                }
            }
            "message_delta" => {
                if let Some(usage) = event.usage {
                    self.record_usage(usage);
                }
                None
            }
            "message_stop" => Some(DeltaEvent::done(self.usage.take())),
            "error" => {
                let error = event.error;
                let status = error_status(error.as_ref().and_then(|e| e.error_type.as_deref()));
                let message = error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Unknown Anthropic error".to_string());
                Some(DeltaEvent::error(message, status))
            }
            // ping, content_block_stop
            _ => None,
        }
    }

    pub fn finish(&mut self) -> DeltaEvent {
        DeltaEvent::done(self.usage.take())
    }

    /// Decode a buffered `message` object.
    pub fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        if body.get("type").and_then(Value::as_str) == Some("error") {
            let error: Option<AnthropicError> = body
                .get("error")
                .and_then(|e| serde_json::from_value(e.clone()).ok());
            let status = error_status(error.as_ref().and_then(|e| e.error_type.as_deref()));
            let message = error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Unknown Anthropic error".to_string());
            return vec![DeltaEvent::error(message, status)];
        }

        let blocks: Vec<AnthropicContent> = body
            .get("content")
            .and_then(|c| serde_json::from_value(c.clone()).ok())
            .unwrap_or_default();

        let mut text = String::new();
        let mut reasoning = String::new();
        for block in blocks {
            match block.content_type.as_str() {
                "text" => text.push_str(block.text.as_deref().unwrap_or_default()),
                "thinking" => reasoning.push_str(block.thinking.as_deref().unwrap_or_default()),
                _ => {}
            }
        }
        let usage = body
            .get("usage")
            .and_then(|u| serde_json::from_value::<AnthropicUsage>(u.clone()).ok())
            .map(Usage::from);

        let mut events = Vec::with_capacity(3);
        if !reasoning.is_empty() {
            events.push(DeltaEvent::reasoning(reasoning));
        }
        events.push(DeltaEvent::content(text));
        events.push(DeltaEvent::done(usage));
        events
    }
}
