//! Persistence Gateway
//!
//! Durable load/save/delete of conversations keyed by id. The reconciler
//! treats `save` as fire-and-forget and only requires `list` to succeed at
//! startup.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::types::Conversation;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChatError>;

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError>;

    async fn list(&self) -> Result<Vec<Conversation>, ChatError>;

    async fn delete(&self, id: &str) -> Result<(), ChatError>;
}
