//! Anthropic Messages API
//!
//! System prompts travel in the top-level `system` field, and `max_tokens`
//! is mandatory.

pub mod streaming;

pub use streaming::AnthropicEventParser;

use serde_json::{Value, json};

use super::{FrameParser, ProviderRequest, RequestContext};
use crate::types::{DeltaEvent, Role};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default)]
pub struct AnthropicAdapter {
    parser: AnthropicEventParser,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameParser for AnthropicAdapter {
    fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        self.parser.parse(frame)
    }

    fn finish(&mut self) -> DeltaEvent {
        self.parser.finish()
    }

    fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        self.parser.parse_complete(body)
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> ProviderRequest {
        // System-role history entries join the top-level system prompt.
        let mut system: Vec<&str> = ctx.system_prompt.filter(|s| !s.is_empty()).into_iter().collect();
        let mut messages = Vec::with_capacity(ctx.messages.len());
        for turn in ctx.messages {
            match turn.role {
                Role::System => system.push(&turn.content),
                Role::User | Role::Assistant => {
                    messages.push(json!({"role": turn.role.as_str(), "content": turn.content}));
                }
            }
        }

        let mut body = json!({
            "model": ctx.model,
            "messages": messages,
            "max_tokens": ctx.max_tokens,
            "stream": ctx.stream,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system.join("\n\n"));
        }

        ProviderRequest::new(format!("{}/v1/messages", ctx.base_url), body, ctx.stream)
            .header("x-api-key", ctx.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}
