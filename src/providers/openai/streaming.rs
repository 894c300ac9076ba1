//! OpenAI chat-completions chunk decoding
//!
//! Shared by every provider that speaks the `choices[].delta` wire format
//! (OpenAI, DeepSeek, Volcengine Ark, DashScope compatible mode, OpenRouter).

use std::collections::VecDeque;

use serde::Deserialize;
use serde_json::Value;

use crate::providers::{decode_frame, in_stream_error};
use crate::types::{DeltaEvent, Usage};

/// Reasoning field names in priority order.
pub const DEFAULT_REASONING_FIELDS: &[&str] = &["reasoning_content", "thinking", "reasoning"];

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Option<Vec<OpenAiStreamChoice>>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<Value>,
    /// Some relays send whole `message` objects instead of deltas
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        let prompt = u.prompt_tokens.unwrap_or(0);
        let completion = u.completion_tokens.unwrap_or(0);
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: u.total_tokens.unwrap_or(prompt + completion),
        }
    }
}

/// First non-blank string among `fields`, in order.
pub(crate) fn extract_reasoning(value: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|name| {
        value
            .get(*name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Stateful decoder for one OpenAI-style stream.
#[derive(Debug, Clone)]
pub struct OpenAiChunkParser {
    provider: &'static str,
    reasoning_fields: &'static [&'static str],
    usage: Option<Usage>,
    /// Full text from a `message` chunk, reconciled at `done`
    final_text: Option<String>,
    streamed_reasoning: bool,
    pending: VecDeque<DeltaEvent>,
}

impl OpenAiChunkParser {
    pub fn new(provider: &'static str) -> Self {
        Self::with_reasoning_fields(provider, DEFAULT_REASONING_FIELDS)
    }

    pub fn with_reasoning_fields(
        provider: &'static str,
        reasoning_fields: &'static [&'static str],
    ) -> Self {
        Self {
            provider,
            reasoning_fields,
            usage: None,
            final_text: None,
            streamed_reasoning: false,
            pending: VecDeque::new(),
        }
    }

    pub fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        let value = decode_frame(self.provider, frame)?;
        if let Some(error) = in_stream_error(&value) {
            return Some(error);
        }

        let chunk: OpenAiStreamChunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(provider = self.provider, error = %e, "Unrecognised chunk shape");
                return None;
            }
        };

        let usage = chunk.usage.map(Usage::from);
        let choices = chunk.choices.unwrap_or_default();

        // Usage-only chunk with no choices marks the end of the stream.
        if choices.is_empty() {
            return usage.map(|usage| {
                let merged = self.merged_usage(usage);
                self.done_event(Some(merged))
            });
        }

        if let Some(usage) = usage {
            self.merged_usage(usage);
        }

        let choice = choices.into_iter().next()?;
        if let Some(delta) = choice.delta {
            return self.delta_event(&delta);
        }
        let message = choice.message?;
        self.stash_message(&message)
    }

    fn delta_event(&mut self, delta: &Value) -> Option<DeltaEvent> {
        let reasoning = extract_reasoning(delta, self.reasoning_fields);
        let content = delta
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);
        if reasoning.is_some() {
            self.streamed_reasoning = true;
        }

        match (reasoning, content) {
            (Some(reasoning), Some(content)) => {
                self.pending.push_back(DeltaEvent::content(content));
                Some(DeltaEvent::reasoning(reasoning))
            }
            (Some(reasoning), None) => Some(DeltaEvent::reasoning(reasoning)),
            (None, Some(content)) => Some(DeltaEvent::content(content)),
            (None, None) => None,
        }
    }

    /// A whole `message` is the final text so far, not an increment. Its
    /// content is held for the terminal event; its reasoning is passed on
    /// only when none was streamed.
    fn stash_message(&mut self, message: &Value) -> Option<DeltaEvent> {
        if let Some(content) = message
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            self.final_text = Some(content.to_string());
        }
        if self.streamed_reasoning {
            return None;
        }
        let reasoning = extract_reasoning(message, self.reasoning_fields)?;
        self.streamed_reasoning = true;
        Some(DeltaEvent::reasoning(reasoning))
    }

    fn done_event(&mut self, usage: Option<Usage>) -> DeltaEvent {
        match self.final_text.take() {
            Some(text) => DeltaEvent::done_with_text(text, usage),
            None => DeltaEvent::done(usage),
        }
    }

    pub fn take_pending(&mut self) -> Option<DeltaEvent> {
        self.pending.pop_front()
    }

    pub fn finish(&mut self) -> DeltaEvent {
        let usage = self.usage.take();
        self.done_event(usage)
    }

    /// Decode a buffered `chat.completion` object.
    pub fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        if let Some(error) = in_stream_error(body) {
            return vec![error];
        }

        let message = body.pointer("/choices/0/message");
        let content = message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let reasoning = message.and_then(|m| extract_reasoning(m, self.reasoning_fields));
        let usage = body
            .get("usage")
            .and_then(|u| serde_json::from_value::<OpenAiUsage>(u.clone()).ok())
            .map(Usage::from);

        let mut events = Vec::with_capacity(3);
        if let Some(reasoning) = reasoning {
            events.push(DeltaEvent::reasoning(reasoning));
        }
        events.push(DeltaEvent::content(content));
        events.push(DeltaEvent::done(usage));
        events
    }

    fn merged_usage(&mut self, usage: Usage) -> Usage {
        let merged = match self.usage {
            Some(mut existing) => {
                existing.merge(usage);
                existing
            }
            None => usage,
        };
        self.usage = Some(merged);
        merged
    }
}
