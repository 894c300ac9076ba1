//! Provider Adapters
//!
//! Each supported provider family turns one textual frame of its streamed
//! response into at most one canonical [`DeltaEvent`], and knows how to
//! shape the outgoing chat request. Dispatch is a closed enum resolved once
//! per model id through the [`ModelCatalog`].

pub mod anthropic;
pub mod gemini;
pub mod models;
pub mod openai;
pub mod openai_compatible;

pub use models::ModelCatalog;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DeltaEvent, Role};

use anthropic::AnthropicAdapter;
use gemini::GeminiAdapter;
use openai::OpenAiAdapter;
use openai_compatible::{OpenRouterAdapter, QwenAdapter};

/// Upstream services the engine can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
    Gemini,
    DeepSeek,
    Huoshan,
    Qwen,
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[
        ProviderKind::OpenAi,
        ProviderKind::Claude,
        ProviderKind::Gemini,
        ProviderKind::DeepSeek,
        ProviderKind::Huoshan,
        ProviderKind::Qwen,
        ProviderKind::OpenRouter,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::Huoshan => "huoshan",
            Self::Qwen => "qwen",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Claude => "Anthropic Claude",
            Self::Gemini => "Google Gemini",
            Self::DeepSeek => "DeepSeek",
            Self::Huoshan => "Volcengine Ark",
            Self::Qwen => "Alibaba DashScope",
            Self::OpenRouter => "OpenRouter",
        }
    }

    /// `(api key variable, base url variable)`
    pub fn env_vars(&self) -> (&'static str, &'static str) {
        match self {
            Self::OpenAi => ("OPENAI_API_KEY", "OPENAI_BASE_URL"),
            Self::Claude => ("CLAUDE_API_KEY", "CLAUDE_BASE_URL"),
            Self::Gemini => ("GEMINI_API_KEY", "GEMINI_BASE_URL"),
            Self::DeepSeek => ("DEEPSEEK_API_KEY", "DEEPSEEK_BASE_URL"),
            Self::Huoshan => ("HUOSHAN_API_KEY", "HUOSHAN_BASE_URL"),
            Self::Qwen => ("DASHSCOPE_API_KEY", "DASHSCOPE_BASE_URL"),
            Self::OpenRouter => ("OPENROUTER_API_KEY", "OPENROUTER_BASE_URL"),
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Claude => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Huoshan => "https://ark.cn-beijing.volces.com/api/v3",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// One message of the outgoing history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything an adapter needs to shape a request.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub model: &'a str,
    pub system_prompt: Option<&'a str>,
    pub messages: &'a [ChatTurn],
    pub stream: bool,
    pub max_tokens: u32,
    pub api_key: &'a str,
    pub base_url: &'a str,
}

/// A fully shaped HTTP request, independent of the transport.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    /// Whether the response is expected as an event stream
    pub stream: bool,
}

impl ProviderRequest {
    pub fn new(url: impl Into<String>, body: Value, stream: bool) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
            stream,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Behaviour every provider family implements.
pub trait FrameParser {
    /// Decode one frame into at most one event.
    fn parse(&mut self, frame: &str) -> Option<DeltaEvent>;

    /// Events queued when one frame carried more than one channel.
    fn take_pending(&mut self) -> Option<DeltaEvent> {
        None
    }

    /// Terminal event for an exhausted body with no explicit `done`.
    fn finish(&mut self) -> DeltaEvent;

    /// Decode a buffered (non-streaming) response body.
    fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent>;

    /// Shape the outgoing request.
    fn build_request(&self, ctx: &RequestContext<'_>) -> ProviderRequest;
}

/// Closed set of provider adapters, one variant per wire family.
#[derive(Debug, Clone)]
pub enum ProviderAdapter {
    OpenAi(OpenAiAdapter),
    Anthropic(AnthropicAdapter),
    Gemini(GeminiAdapter),
    Qwen(QwenAdapter),
    OpenRouter(OpenRouterAdapter),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            ProviderAdapter::OpenAi($inner) => $body,
            ProviderAdapter::Anthropic($inner) => $body,
            ProviderAdapter::Gemini($inner) => $body,
            ProviderAdapter::Qwen($inner) => $body,
            ProviderAdapter::OpenRouter($inner) => $body,
        }
    };
}

impl ProviderAdapter {
    /// Fresh adapter (with clean per-session state) for a provider.
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi | ProviderKind::DeepSeek | ProviderKind::Huoshan => {
                Self::OpenAi(OpenAiAdapter::new(kind))
            }
            ProviderKind::Claude => Self::Anthropic(AnthropicAdapter::new()),
            ProviderKind::Gemini => Self::Gemini(GeminiAdapter::new()),
            ProviderKind::Qwen => Self::Qwen(QwenAdapter::new()),
            ProviderKind::OpenRouter => Self::OpenRouter(OpenRouterAdapter::new()),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
            Self::Gemini(_) => "gemini",
            Self::Qwen(_) => "qwen",
            Self::OpenRouter(_) => "openrouter",
        }
    }

    pub fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        dispatch!(self, inner => inner.parse(frame))
    }

    pub fn take_pending(&mut self) -> Option<DeltaEvent> {
        dispatch!(self, inner => inner.take_pending())
    }

    pub fn finish(&mut self) -> DeltaEvent {
        dispatch!(self, inner => inner.finish())
    }

    pub fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        dispatch!(self, inner => inner.parse_complete(body))
    }

    pub fn build_request(&self, ctx: &RequestContext<'_>) -> ProviderRequest {
        dispatch!(self, inner => inner.build_request(ctx))
    }
}

/// A frame after its SSE field prefix has been examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePayload<'a> {
    /// `data:` payload, or an unprefixed line
    Data(&'a str),
    /// `event:` name line
    Event(&'a str),
    /// `id:`/`retry:` and other fields carrying no content
    Ignored,
}

/// Strip the `event: `/`data: ` prefix convention from a frame.
pub fn split_frame(frame: &str) -> FramePayload<'_> {
    let frame = frame.trim();
    if let Some(rest) = frame.strip_prefix("data:") {
        return FramePayload::Data(rest.trim_start());
    }
    if let Some(rest) = frame.strip_prefix("event:") {
        return FramePayload::Event(rest.trim_start());
    }
    if frame.starts_with("id:") || frame.starts_with("retry:") || frame.starts_with(':') {
        return FramePayload::Ignored;
    }
    FramePayload::Data(frame)
}

/// Decode a frame's JSON payload, logging (not failing) on malformed input.
pub(crate) fn decode_frame(provider: &str, frame: &str) -> Option<Value> {
    let data = match split_frame(frame) {
        FramePayload::Data(data) => data,
        FramePayload::Event(name) => {
            tracing::trace!(provider, event = name, "SSE event name");
            return None;
        }
        FramePayload::Ignored => return None,
    };
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(value) => Some(value),
        Err(e) => {
            let preview: String = data.chars().take(120).collect();
            tracing::warn!(provider, error = %e, frame = %preview, "Skipping malformed stream frame");
            None
        }
    }
}

/// Extract `{"error": {"message": ...}}` style payloads carried inside a stream.
pub(crate) fn in_stream_error(value: &Value) -> Option<DeltaEvent> {
    let error = value.get("error")?;
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown provider error")
            .to_string(),
        _ => return None,
    };
    let status = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok());
    Some(DeltaEvent::error(message, status))
}
