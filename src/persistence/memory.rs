use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::ConversationStore;
use crate::error::ChatError;
use crate::types::Conversation;

/// In-process store. Counts writes so callers can observe save coalescing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing conversations.
    pub fn with_conversations(conversations: impl IntoIterator<Item = Conversation>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.conversations.lock() {
            map.extend(conversations.into_iter().map(|c| (c.id.clone(), c)));
        }
        store
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored conversation without going through the trait.
    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.conversations.lock().ok()?.get(id).cloned()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Conversation>>, ChatError> {
        self.conversations
            .lock()
            .map_err(|_| ChatError::StorageError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChatError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        self.lock()?
            .insert(conversation.id.clone(), conversation.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), ChatError> {
        self.lock()?.remove(id);
        Ok(())
    }
}
