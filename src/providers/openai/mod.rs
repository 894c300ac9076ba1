//! OpenAI chat-completions family
//!
//! Also serves DeepSeek and Volcengine Ark, which expose the same
//! `/chat/completions` contract under a different base URL.

pub mod streaming;

pub use streaming::OpenAiChunkParser;

use serde_json::{Value, json};

use super::{ChatTurn, FrameParser, ProviderKind, ProviderRequest, RequestContext};
use crate::types::DeltaEvent;

/// `messages` array in chat-completions shape, system prompt first.
pub(crate) fn chat_messages(system_prompt: Option<&str>, messages: &[ChatTurn]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        out.push(json!({"role": "system", "content": system}));
    }
    out.extend(
        messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
    );
    out
}

/// Request body shared by every chat-completions compatible provider.
pub(crate) fn chat_completions_body(ctx: &RequestContext<'_>, stream: bool) -> Value {
    let mut body = json!({
        "model": ctx.model,
        "messages": chat_messages(ctx.system_prompt, ctx.messages),
        "stream": stream,
    });
    if stream {
        body["stream_options"] = json!({"include_usage": true});
    }
    body
}

pub(crate) fn chat_completions_request(ctx: &RequestContext<'_>, body: Value, stream: bool) -> ProviderRequest {
    ProviderRequest::new(format!("{}/chat/completions", ctx.base_url), body, stream)
        .header("Authorization", format!("Bearer {}", ctx.api_key))
}

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    kind: ProviderKind,
    parser: OpenAiChunkParser,
}

impl OpenAiAdapter {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            parser: OpenAiChunkParser::new(kind.id()),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }
}

impl FrameParser for OpenAiAdapter {
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
        let body = chat_completions_body(ctx, ctx.stream);
        chat_completions_request(ctx, body, ctx.stream)
    }
}
