//! Conversation persistence
//!
//! Owns the conversation record: name, provider params, the running token
//! count, and the canonical message-id order. The token count and order
//! list are append-only and never directly settable by a caller — the only
//! write paths are `create`, `update_metadata` (name/params) and
//! `apply_append`.

use crate::error::ServiceError;
use crate::models::{Conversation, ConversationSummary, ConversationUpdate, Params};
use crate::storage::StorageClient;
use crate::store::MessageStore;
use crate::Result;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Storage collection holding conversation documents.
pub const CONVERSATIONS: &str = "conversations";

pub struct ConversationStore {
    storage: Arc<dyn StorageClient>,
    messages: Arc<MessageStore>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn StorageClient>, messages: Arc<MessageStore>) -> Self {
        Self { storage, messages }
    }

    /// Create an empty conversation: zero tokens, no message order.
    pub async fn create(&self, name: String, params: Params) -> Result<String> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            name,
            params,
            tokens: 0,
            message_order: Vec::new(),
        };

        let doc = serde_json::to_value(&conversation)?;
        let id = self.storage.insert(CONVERSATIONS, doc).await.map_err(|e| {
            error!("Failed to create conversation: {}", e);
            e
        })?;

        info!("Created conversation {}", id);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Conversation> {
        let doc = self
            .storage
            .get_by_id(CONVERSATIONS, id)
            .await?
            .ok_or_else(|| not_found(id))?;

        serde_json::from_value(doc).map_err(ServiceError::from)
    }

    /// All conversations, without order lists or message content.
    pub async fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        let docs = self.storage.find_all(CONVERSATIONS).await?;

        docs.into_iter()
            .map(|doc| {
                let conversation: Conversation = serde_json::from_value(doc)?;
                Ok(conversation.summary())
            })
            .collect()
    }

    /// Overwrite only the supplied metadata fields. Tokens and message
    /// order are untouchable through this path.
    pub async fn update_metadata(&self, id: &str, update: ConversationUpdate) -> Result<()> {
        let updated = self
            .storage
            .update(
                CONVERSATIONS,
                id,
                Box::new(move |doc: &mut serde_json::Value| {
                    let mut conversation: Conversation =
                        serde_json::from_value(doc.clone())?;

                    if let Some(name) = update.name {
                        conversation.name = name;
                    }
                    if let Some(params) = update.params {
                        conversation.params = params;
                    }

                    *doc = serde_json::to_value(&conversation)?;
                    Ok(())
                }),
            )
            .await?;

        if updated.is_none() {
            return Err(not_found(id));
        }

        Ok(())
    }

    /// Cascade delete: the conversation's messages first, then the record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        // Existence check up front so an unknown id deletes nothing.
        self.get(id).await?;

        let removed = self.messages.delete_all_for_conversation(id).await?;
        self.storage.delete(CONVERSATIONS, id).await?;

        info!("Deleted conversation {} and {} messages", id, removed);
        Ok(())
    }

    /// The append mutation: push a message id onto the order list and add
    /// its token delta, as one conditional storage update. Concurrent
    /// appends against the same conversation serialize at the storage
    /// layer instead of racing on read-then-write.
    pub async fn apply_append(
        &self,
        id: &str,
        message_id: &str,
        token_delta: u64,
    ) -> Result<Conversation> {
        let message_id = message_id.to_string();

        let updated = self
            .storage
            .update(
                CONVERSATIONS,
                id,
                Box::new(move |doc: &mut serde_json::Value| {
                    let mut conversation: Conversation =
                        serde_json::from_value(doc.clone())?;

                    conversation.message_order.push(message_id);
                    conversation.tokens += token_delta;

                    *doc = serde_json::to_value(&conversation)?;
                    Ok(())
                }),
            )
            .await?
            .ok_or_else(|| not_found(id))?;

        serde_json::from_value(updated).map_err(ServiceError::from)
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Conversation with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use crate::storage::InMemoryStorage;
    use std::collections::HashMap;

    fn stores() -> (Arc<MessageStore>, ConversationStore) {
        let storage: Arc<dyn StorageClient> = Arc::new(InMemoryStorage::new());
        let messages = Arc::new(MessageStore::new(storage.clone()));
        let conversations = ConversationStore::new(storage, messages.clone());
        (messages, conversations)
    }

    #[tokio::test]
    async fn test_create_starts_empty() {
        let (_, conversations) = stores();

        let id = conversations
            .create("chat".to_string(), HashMap::new())
            .await
            .unwrap();

        let conversation = conversations.get(&id).await.unwrap();
        assert_eq!(conversation.tokens, 0);
        assert!(conversation.message_order.is_empty());
        assert_eq!(conversation.name, "chat");
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (_, conversations) = stores();
        let err = conversations.get("missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_accumulates_tokens_and_order() {
        let (_, conversations) = stores();
        let id = conversations
            .create("chat".to_string(), HashMap::new())
            .await
            .unwrap();

        let deltas = [7u64, 11, 13];
        for (i, delta) in deltas.iter().enumerate() {
            conversations
                .apply_append(&id, &format!("m{}", i), *delta)
                .await
                .unwrap();
        }

        let conversation = conversations.get(&id).await.unwrap();
        assert_eq!(conversation.tokens, deltas.iter().sum::<u64>());
        assert_eq!(conversation.message_order, vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn test_append_unknown_is_not_found() {
        let (_, conversations) = stores();
        let err = conversations
            .apply_append("missing", "m1", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_metadata_is_partial() {
        let (_, conversations) = stores();
        let params: Params = HashMap::from([("temperature".to_string(), 0.7)]);
        let id = conversations
            .create("chat".to_string(), params.clone())
            .await
            .unwrap();
        conversations.apply_append(&id, "m1", 9).await.unwrap();

        conversations
            .update_metadata(
                &id,
                ConversationUpdate {
                    name: Some("renamed".to_string()),
                    params: None,
                },
            )
            .await
            .unwrap();

        let conversation = conversations.get(&id).await.unwrap();
        assert_eq!(conversation.name, "renamed");
        assert_eq!(conversation.params, params);
        assert_eq!(conversation.tokens, 9);
        assert_eq!(conversation.message_order, vec!["m1"]);
    }

    #[tokio::test]
    async fn test_update_metadata_unknown_is_not_found() {
        let (_, conversations) = stores();
        let err = conversations
            .update_metadata("missing", ConversationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_messages() {
        let (messages, conversations) = stores();
        let id = conversations
            .create("chat".to_string(), HashMap::new())
            .await
            .unwrap();
        messages
            .create(MessageRole::User, "hello".to_string(), &id)
            .await
            .unwrap();

        conversations.delete(&id).await.unwrap();

        assert!(messages.find_by_conversation(&id).await.unwrap().is_empty());
        let err = conversations.get(&id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_unknown_leaves_others_alone() {
        let (messages, conversations) = stores();
        let keep = conversations
            .create("keep".to_string(), HashMap::new())
            .await
            .unwrap();
        messages
            .create(MessageRole::User, "kept".to_string(), &keep)
            .await
            .unwrap();

        let err = conversations.delete("missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        assert!(conversations.get(&keep).await.is_ok());
        assert_eq!(messages.find_by_conversation(&keep).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_excludes_order() {
        let (_, conversations) = stores();
        conversations
            .create("a".to_string(), HashMap::new())
            .await
            .unwrap();
        conversations
            .create("b".to_string(), HashMap::new())
            .await
            .unwrap();

        let summaries = conversations.list_all().await.unwrap();
        assert_eq!(summaries.len(), 2);
    }
}
