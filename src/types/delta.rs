use serde::{Deserialize, Serialize};

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Fold a later partial report into this one, keeping non-zero fields.
    pub fn merge(&mut self, other: Usage) {
        if other.prompt_tokens > 0 {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens > 0 {
            self.completion_tokens = other.completion_tokens;
        }
        self.total_tokens = if other.total_tokens > 0 {
            other.total_tokens.max(self.prompt_tokens + self.completion_tokens)
        } else {
            self.prompt_tokens + self.completion_tokens
        };
    }
}

/// Kind of a canonical stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Content,
    Reasoning,
    Done,
    Error,
}

/// Canonical unit produced by a provider adapter.
///
/// For `Done`, `text` optionally carries a full final text the provider
/// returned on completion. For `Error`, `text` is the user-visible message
/// and `status` the HTTP status when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub kind: DeltaKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl DeltaEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: DeltaKind::Content,
            text: text.into(),
            usage: None,
            status: None,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            kind: DeltaKind::Reasoning,
            text: text.into(),
            usage: None,
            status: None,
        }
    }

    pub fn done(usage: Option<Usage>) -> Self {
        Self {
            kind: DeltaKind::Done,
            text: String::new(),
            usage,
            status: None,
        }
    }

    /// Terminal event that also carries the provider's full final text.
    pub fn done_with_text(text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            kind: DeltaKind::Done,
            text: text.into(),
            usage,
            status: None,
        }
    }

    pub fn error(text: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            kind: DeltaKind::Error,
            text: text.into(),
            usage: None,
            status,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, DeltaKind::Done | DeltaKind::Error)
    }
}

/// Lifecycle of one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl StreamStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}
