//! Prompt resolution and outgoing history

use crate::config::{ChatSettings, PromptType, SendOptions};
use crate::providers::ChatTurn;
use crate::types::{Message, Role};

const PROMPT_SEPARATOR: &str = "\n\n";

/// Effective model and prompt text for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub model: String,
    /// Sent as the system message
    pub system_prompt: Option<String>,
    /// Prepended to the outgoing user text
    pub direct_prefix: Option<String>,
}

fn join(parts: Vec<&str>) -> Option<String> {
    let parts: Vec<&str> = parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(PROMPT_SEPARATOR))
}

/// Merge the per-call override with the global defaults.
///
/// Model: explicit option, then the prompt's model, then the default.
/// Prompt text of each type is the global prompt (when enabled) followed by
/// the per-call prompt.
pub fn resolve_prompt(settings: &ChatSettings, options: &SendOptions) -> ResolvedPrompt {
    let prompt = options.prompt.as_ref();
    let model = options
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| prompt.and_then(|p| p.model.clone()).filter(|m| !m.trim().is_empty()))
        .unwrap_or_else(|| settings.default_model.clone());

    let mut system = Vec::new();
    let mut direct = Vec::new();
    if settings.use_global_prompt {
        match settings.global_prompt_type {
            PromptType::System => system.push(settings.global_prompt.as_str()),
            PromptType::Direct => direct.push(settings.global_prompt.as_str()),
        }
    }
    if let Some(prompt) = prompt {
        match prompt.prompt_type {
            PromptType::System => system.push(prompt.content.as_str()),
            PromptType::Direct => direct.push(prompt.content.as_str()),
        }
    }

    ResolvedPrompt {
        model,
        system_prompt: join(system),
        direct_prefix: join(direct),
    }
}

/// Outgoing history for a request.
///
/// Hidden and empty messages are left out, as is `exclude_id` (the
/// placeholder of the reply being requested). The direct prefix applies
/// only to the last user message.
pub fn build_history(
    messages: &[Message],
    exclude_id: &str,
    direct_prefix: Option<&str>,
) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = messages
        .iter()
        .filter(|m| m.id != exclude_id && !m.hidden && !m.content.trim().is_empty())
        .map(|m| ChatTurn::new(m.role, m.content.clone()))
        .collect();

    if let Some(prefix) = direct_prefix
        && let Some(last_user) = turns.iter_mut().rev().find(|t| t.role == Role::User)
    {
        last_user.content = format!("{prefix}{PROMPT_SEPARATOR}{}", last_user.content);
    }
    turns
}
