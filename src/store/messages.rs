//! Message persistence
//!
//! Messages are immutable: created once, read in bulk per conversation,
//! and removed only by the conversation cascade. There is no update path.

use crate::error::ServiceError;
use crate::models::{Message, MessageRole};
use crate::storage::StorageClient;
use crate::Result;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// Storage collection holding message documents.
pub const MESSAGES: &str = "messages";

pub struct MessageStore {
    storage: Arc<dyn StorageClient>,
}

impl MessageStore {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    /// Insert a new message and return its id.
    pub async fn create(
        &self,
        role: MessageRole,
        content: String,
        conversation_id: &str,
    ) -> Result<String> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            conversation_id: conversation_id.to_string(),
        };

        let doc = serde_json::to_value(&message)?;
        self.storage.insert(MESSAGES, doc).await.map_err(|e| {
            error!("Failed to store message for conversation {}: {}", conversation_id, e);
            e
        })
    }

    /// One bulk fetch of every message owned by a conversation. Unordered;
    /// the transcript assembler imposes the canonical order.
    pub async fn find_by_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let docs = self
            .storage
            .find_by_field(MESSAGES, "conversation_id", conversation_id)
            .await?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(ServiceError::from))
            .collect()
    }

    /// Cascade helper: remove every message owned by a conversation.
    pub async fn delete_all_for_conversation(&self, conversation_id: &str) -> Result<u64> {
        self.storage
            .delete_by_field(MESSAGES, "conversation_id", conversation_id)
            .await
    }
}
