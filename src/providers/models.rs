//! Model catalogue
//!
//! Static lookup from model id to the provider that serves it.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::ProviderKind;
use crate::error::ChatError;

/// `OpenAI` model constants
pub mod openai {
    pub const GPT_3_5_TURBO: &str = "gpt-3.5-turbo";
    pub const GPT_4: &str = "gpt-4";
    pub const GPT_4_TURBO: &str = "gpt-4-turbo";
    pub const GPT_4O: &str = "gpt-4o";
    pub const GPT_4O_MINI: &str = "gpt-4o-mini";
    /// `gpt-4o-mini` through a relay that rewrites the id
    pub const GPT_4O_MINI_CA: &str = "gpt-4o-mini-ca";
    pub const O3_MINI: &str = "o3-mini";
    pub const GROK_3: &str = "grok-3";

    pub const ALL: &[&str] = &[
        GPT_3_5_TURBO,
        GPT_4,
        GPT_4_TURBO,
        GPT_4O,
        GPT_4O_MINI,
        GPT_4O_MINI_CA,
        O3_MINI,
        GROK_3,
    ];
}

/// Anthropic model constants
pub mod claude {
    pub const CLAUDE_3_OPUS: &str = "claude-3-opus";
    pub const CLAUDE_3_SONNET: &str = "claude-3-sonnet";
    pub const CLAUDE_3_HAIKU: &str = "claude-3-haiku";
    pub const CLAUDE_3_5_HAIKU: &str = "claude-3-5-haiku-20241022";
    pub const CLAUDE_3_7_SONNET: &str = "claude-3-7-sonnet-20250219";

    pub const ALL: &[&str] = &[
        CLAUDE_3_OPUS,
        CLAUDE_3_SONNET,
        CLAUDE_3_HAIKU,
        CLAUDE_3_5_HAIKU,
        CLAUDE_3_7_SONNET,
    ];
}

/// Gemini model constants
pub mod gemini {
    pub const GEMINI_PRO: &str = "gemini-pro";
    pub const GEMINI_PRO_VISION: &str = "gemini-pro-vision";
    pub const GEMINI_2_FLASH: &str = "gemini-2.0-flash";
    pub const GEMINI_1_5_FLASH: &str = "gemini-1.5-flash-latest";

    pub const ALL: &[&str] = &[GEMINI_PRO, GEMINI_PRO_VISION, GEMINI_2_FLASH, GEMINI_1_5_FLASH];
}

/// `DeepSeek` model constants
pub mod deepseek {
    pub const CHAT: &str = "deepseek-chat";
    pub const REASONER: &str = "deepseek-reasoner";

    pub const ALL: &[&str] = &[CHAT, REASONER];
}

/// Volcengine Ark hosted models
pub mod huoshan {
    pub const DEEPSEEK_R1: &str = "deepseek-r1-250120";
    pub const DEEPSEEK_R1_QWEN_32B: &str = "deepseek-r1-distill-qwen-32b-250120";
    pub const DEEPSEEK_R1_QWEN_7B: &str = "deepseek-r1-distill-qwen-7b-250120";
    pub const DEEPSEEK_V3: &str = "deepseek-v3-241226";

    pub const ALL: &[&str] = &[
        DEEPSEEK_R1,
        DEEPSEEK_R1_QWEN_32B,
        DEEPSEEK_R1_QWEN_7B,
        DEEPSEEK_V3,
    ];
}

/// DashScope model constants
pub mod qwen {
    pub const QWEN_PLUS: &str = "qwen-plus";
    pub const QWEN_PLUS_LATEST: &str = "qwen-plus-latest";
    pub const QWEN_MAX: &str = "qwen-max";
    pub const QWQ_32B: &str = "qwq-32b";

    pub const ALL: &[&str] = &[QWEN_PLUS, QWEN_PLUS_LATEST, QWEN_MAX, QWQ_32B];
}

/// `OpenRouter` model constants
pub mod openrouter {
    pub const GEMINI_FLASH_LITE: &str = "google/gemini-2.0-flash-lite-001";
    pub const GEMINI_FLASH_001: &str = "google/gemini-2.0-flash-001";
    pub const GEMINI_PRO_EXP: &str = "google/gemini-2.0-pro-exp-02-05:free";
    pub const GEMINI_FLASH_THINKING: &str = "google/gemini-2.0-flash-thinking-exp:free";
    pub const CLAUDE_OPUS: &str = "anthropic/claude-3-opus";
    pub const LLAMA_3_70B: &str = "meta-llama/llama-3-70b-instruct";
    pub const MIXTRAL_8X7B: &str = "mistralai/mixtral-8x7b-instruct";
    pub const DEEPSEEK_V3: &str = "deepseek/deepseek-chat-v3-0324";

    pub const ALL: &[&str] = &[
        GEMINI_FLASH_LITE,
        GEMINI_FLASH_001,
        GEMINI_PRO_EXP,
        GEMINI_FLASH_THINKING,
        CLAUDE_OPUS,
        LLAMA_3_70B,
        MIXTRAL_8X7B,
        DEEPSEEK_V3,
    ];
}

lazy_static! {
    static ref BUILTIN_MODELS: HashMap<&'static str, ProviderKind> = {
        let groups: [(&[&str], ProviderKind); 7] = [
            (openai::ALL, ProviderKind::OpenAi),
            (claude::ALL, ProviderKind::Claude),
            (gemini::ALL, ProviderKind::Gemini),
            (deepseek::ALL, ProviderKind::DeepSeek),
            (huoshan::ALL, ProviderKind::Huoshan),
            (qwen::ALL, ProviderKind::Qwen),
            (openrouter::ALL, ProviderKind::OpenRouter),
        ];
        let mut map = HashMap::new();
        for (models, kind) in groups {
            for model in models {
                map.insert(*model, kind);
            }
        }
        map
    };
}

/// Model id to provider lookup: the built-in table plus caller registrations.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    extra: HashMap<String, ProviderKind>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an additional model id through `kind`.
    pub fn register(&mut self, model: impl Into<String>, kind: ProviderKind) {
        self.extra.insert(model.into(), kind);
    }

    pub fn with_model(mut self, model: impl Into<String>, kind: ProviderKind) -> Self {
        self.register(model, kind);
        self
    }

    pub fn resolve(&self, model: &str) -> Result<ProviderKind, ChatError> {
        let model = model.trim();
        self.extra
            .get(model)
            .copied()
            .or_else(|| BUILTIN_MODELS.get(model).copied())
            .ok_or_else(|| ChatError::ConfigurationError(format!("Unknown model: {model}")))
    }

    /// Every known model id served by `kind`, sorted.
    pub fn models_for(&self, kind: ProviderKind) -> Vec<String> {
        let mut models: Vec<String> = BUILTIN_MODELS
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(m, _)| m.to_string())
            .chain(
                self.extra
                    .iter()
                    .filter(|(_, k)| **k == kind)
                    .map(|(m, _)| m.clone()),
            )
            .collect();
        models.sort();
        models.dedup();
        models
    }
}
