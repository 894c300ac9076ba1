//! Alibaba DashScope (compatible mode)
//!
//! Requires `incremental_output` so each chunk carries only new text, and
//! the QwQ reasoning models refuse non-streaming calls.

use serde_json::Value;

use crate::providers::openai::{OpenAiChunkParser, chat_completions_body, chat_completions_request};
use crate::providers::{FrameParser, ProviderRequest, RequestContext};
use crate::types::DeltaEvent;

const QWEN_REASONING_FIELDS: &[&str] = &["reasoning_content"];

/// QwQ models only support streaming output.
pub fn requires_streaming(model: &str) -> bool {
    model.starts_with("qwq")
}

#[derive(Debug, Clone)]
pub struct QwenAdapter {
    parser: OpenAiChunkParser,
}

impl QwenAdapter {
    pub fn new() -> Self {
        Self {
            parser: OpenAiChunkParser::with_reasoning_fields("qwen", QWEN_REASONING_FIELDS),
        }
    }
}

impl Default for QwenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser for QwenAdapter {
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
        let stream = ctx.stream || requires_streaming(ctx.model);
        if stream && !ctx.stream {
            tracing::debug!(model = ctx.model, "Forcing streaming for QwQ model");
        }
        let mut body = chat_completions_body(ctx, stream);
        if stream {
            body["incremental_output"] = Value::Bool(true);
        }
        chat_completions_request(ctx, body, stream)
    }
}
