//! Gemini `streamGenerateContent` decoding

use std::collections::VecDeque;

use serde::Deserialize;
use serde_json::Value;

use crate::providers::{decode_frame, in_stream_error};
use crate::types::{DeltaEvent, Usage};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    /// Set on thought-summary parts of thinking models
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    thoughts_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        let prompt = u.prompt_token_count.unwrap_or(0);
        let completion =
            u.candidates_token_count.unwrap_or(0) + u.thoughts_token_count.unwrap_or(0);
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: u.total_token_count.unwrap_or(prompt + completion),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// `(reasoning, content)` text of the first candidate.
fn split_parts(response: &GenerateContentResponse) -> (String, String) {
    let mut reasoning = String::new();
    let mut content = String::new();
    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();
    for part in parts {
        let Some(text) = part.text.as_deref() else {
            continue;
        };
        if part.thought.unwrap_or(false) {
            reasoning.push_str(text);
        } else {
            content.push_str(text);
        }
    }
    (reasoning, content)
}

/// Stateful decoder for one Gemini stream.
#[derive(Debug, Clone, Default)]
pub struct GeminiChunkParser {
    usage: Option<Usage>,
    pending: VecDeque<DeltaEvent>,
}

impl GeminiChunkParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(value: Value) -> Option<GenerateContentResponse> {
        match serde_json::from_value(value) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(provider = "gemini", error = %e, "Unrecognised chunk shape");
                None
            }
        }
    }

    pub fn parse(&mut self, frame: &str) -> Option<DeltaEvent> {
        let value = decode_frame("gemini", frame)?;
        if let Some(error) = in_stream_error(&value) {
            return Some(error);
        }
        let response = Self::decode(value)?;

        if let Some(usage) = response.usage_metadata {
            // Gemini reports cumulative counts on every chunk.
            self.usage = Some(Usage::from(usage));
        }
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Some(DeltaEvent::error(
                format!("Prompt blocked by Gemini: {reason}"),
                None,
            ));
        }

        let (reasoning, content) = split_parts(&response);
        match (reasoning.is_empty(), content.is_empty()) {
            (false, false) => {
                self.pending.push_back(DeltaEvent::content(content));
                Some(DeltaEvent::reasoning(reasoning))
            }
            (false, true) => Some(DeltaEvent::reasoning(reasoning)),
            (true, false) => Some(DeltaEvent::content(content)),
            (true, true) => None,
        }
    }

    pub fn take_pending(&mut self) -> Option<DeltaEvent> {
        self.pending.pop_front()
    }

    pub fn finish(&mut self) -> DeltaEvent {
        DeltaEvent::done(self.usage.take())
    }

    pub fn parse_complete(&mut self, body: &Value) -> Vec<DeltaEvent> {
        if let Some(error) = in_stream_error(body) {
            return vec![error];
        }
        let response = Self::decode(body.clone()).unwrap_or_default();
        let (reasoning, content) = split_parts(&response);
        let usage = response.usage_metadata.map(Usage::from);

        let mut events = Vec::with_capacity(3);
        if !reasoning.is_empty() {
            events.push(DeltaEvent::reasoning(reasoning));
        }
        events.push(DeltaEvent::content(content));
        events.push(DeltaEvent::done(usage));
        events
    }
}
