use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where a prompt's text is placed in the outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    /// Prepended to the user's text
    Direct,
    /// Sent as the system message
    #[default]
    System,
}

/// User-level chat defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub default_model: String,
    pub global_prompt: String,
    pub use_global_prompt: bool,
    pub global_prompt_type: PromptType,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: "deepseek/deepseek-chat-v3-0324".to_string(),
            global_prompt: String::new(),
            use_global_prompt: false,
            global_prompt_type: PromptType::System,
        }
    }
}

/// A prompt selected for one exchange. Overrides the global defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOverride {
    pub id: Option<String>,
    pub model: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub prompt_type: PromptType,
}

impl PromptOverride {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            prompt_type: PromptType::System,
            ..Default::default()
        }
    }

    pub fn direct(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            prompt_type: PromptType::Direct,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Per-call options for `Reconciler::send_message`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub prompt: Option<PromptOverride>,
    /// Model to use regardless of prompt and settings
    pub model: Option<String>,
    /// Overrides `ReconcilerConfig::stream` for this exchange
    pub stream: Option<bool>,
}

impl SendOptions {
    pub fn with_prompt(mut self, prompt: PromptOverride) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Quiet period before a transcript is written to the store
    pub save_debounce: Duration,
    /// Request incremental output by default
    pub stream: bool,
    /// Completion budget for providers that require one (Anthropic)
    pub max_tokens: u32,
    /// Capacity of the transcript event channel
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(500),
            stream: true,
            max_tokens: 4096,
            event_capacity: 256,
        }
    }
}
