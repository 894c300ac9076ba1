use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, Role};

/// Name given to conversations until the first user message renames them.
pub const DEFAULT_CONVERSATION_NAME: &str = "New Conversation";

const AUTO_NAME_CHARS: usize = 30;

/// A persisted chat transcript.
///
/// `messages` is in arrival order, which may briefly differ from timestamp
/// order while a recovery merge is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub messages: Vec<Message>,
    pub active_prompt_id: Option<String>,
    pub scene_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: DEFAULT_CONVERSATION_NAME.to_string(),
            messages: Vec::new(),
            active_prompt_id: None,
            scene_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn find(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn find_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    pub fn assistant_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Assistant).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rename from the first user message while the default name is still set.
    pub fn auto_name(&mut self, first_user_text: &str) {
        if self.name != DEFAULT_CONVERSATION_NAME {
            return;
        }
        let trimmed = first_user_text.trim();
        if trimmed.is_empty() {
            return;
        }
        let mut name: String = trimmed.chars().take(AUTO_NAME_CHARS).collect();
        if trimmed.chars().count() > AUTO_NAME_CHARS {
            name.push_str("...");
        }
        self.name = name;
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalogue entry shown in conversation lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            name: conversation.name.clone(),
            message_count: conversation.messages.len(),
            updated_at: conversation.updated_at,
        }
    }
}
