use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::ConversationStore;
use crate::error::ChatError;
use crate::types::Conversation;

/// One pretty-printed JSON document per conversation under `root`.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the store directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            ChatError::StorageError(format!("Cannot create {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, ChatError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ChatError::InvalidInput(format!(
                "Conversation id is not a valid file name: {id:?}"
            )));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChatError> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let conversation = serde_json::from_slice(&bytes)?;
        Ok(Some(conversation))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let path = self.path_for(&conversation.id)?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", conversation.id, uuid::Uuid::new_v4()));
        let payload = serde_json::to_vec_pretty(conversation)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::trace!(conversation_id = %conversation.id, path = %path.display(), "Saved conversation");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Conversation>, ChatError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut conversations = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Conversation>(&bytes) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable conversation file");
                }
            }
        }
        Ok(conversations)
    }

    async fn delete(&self, id: &str) -> Result<(), ChatError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
