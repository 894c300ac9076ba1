//! OpenRouter
//!
//! Attribution headers identify the calling app; reasoning arrives in the
//! `reasoning` field when `include_reasoning` is requested.

use serde_json::Value;

use crate::providers::openai::{OpenAiChunkParser, chat_completions_body, chat_completions_request};
use crate::providers::{FrameParser, ProviderRequest, RequestContext};
use crate::types::DeltaEvent;

pub const APP_REFERER: &str = "https://github.com/pharos-chat/pharos";
pub const APP_TITLE: &str = "Pharos";

const OPENROUTER_REASONING_FIELDS: &[&str] = &["reasoning", "reasoning_content"];

#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    parser: OpenAiChunkParser,
}

impl OpenRouterAdapter {
    pub fn new() -> Self {
        Self {
            parser: OpenAiChunkParser::with_reasoning_fields(
                "openrouter",
                OPENROUTER_REASONING_FIELDS,
            ),
        }
    }
}

impl Default for OpenRouterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser for OpenRouterAdapter {
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
        let mut body = chat_completions_body(ctx, ctx.stream);
        body["include_reasoning"] = Value::Bool(true);
        chat_completions_request(ctx, body, ctx.stream)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
    }
}
