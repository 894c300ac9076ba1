//! Google Gemini `generateContent` API
//!
//! Assistant turns are sent with role `model`; the system prompt goes in
//! `systemInstruction`.

pub mod streaming;

pub use streaming::GeminiChunkParser;

use serde_json::{Value, json};

use super::{FrameParser, ProviderRequest, RequestContext};
use crate::types::{DeltaEvent, Role};

#[derive(Debug, Clone, Default)]
pub struct GeminiAdapter {
    parser: GeminiChunkParser,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameParser for GeminiAdapter {
    fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        self.parser.parse(frame)
    }

    fn take_pending(&mut self) -> Option<DeltaEvent> {
        self.parser.take_pending()
    }

    fn finish(&mut self) -> DeltaEvent {
        self.parser.finish()
    }

    fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        self.parser.parse_complete(body)
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> ProviderRequest {
        let mut system: Vec<&str> = ctx.system_prompt.filter(|s| !s.is_empty()).into_iter().collect();
        let mut contents = Vec::with_capacity(ctx.messages.len());
        for turn in ctx.messages {
            let role = match turn.role {
                Role::System => {
                    system.push(&turn.content);
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(json!({"role": role, "parts": [{"text": turn.content}]}));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {"maxOutputTokens": ctx.max_tokens},
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system.join("\n\n")}]});
        }

        let url = if ctx.stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", ctx.base_url, ctx.model)
        } else {
            format!("{}/models/{}:generateContent", ctx.base_url, ctx.model)
        };
        ProviderRequest::new(url, body, ctx.stream).header("x-goog-api-key", ctx.api_key)
    }
}
