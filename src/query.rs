//! End-to-end query flow
//!
//! redact → store user message → count → append → complete → store
//! assistant message → count → append → reply. A failure after the user
//! append leaves the conversation with only the user message; there is no
//! rollback, and a client can detect the partial state by re-reading the
//! conversation.

use crate::models::MessageRole;
use crate::provider::CompletionProvider;
use crate::redaction::RedactionService;
use crate::store::MessageStore;
use crate::tokenizer::Tokenizer;
use crate::transcript::ConversationMutator;
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub struct QueryPipeline {
    messages: Arc<MessageStore>,
    mutator: Arc<ConversationMutator>,
    redaction: Arc<dyn RedactionService>,
    tokenizer: Arc<dyn Tokenizer>,
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl QueryPipeline {
    pub fn new(
        messages: Arc<MessageStore>,
        mutator: Arc<ConversationMutator>,
        redaction: Arc<dyn RedactionService>,
        tokenizer: Arc<dyn Tokenizer>,
        provider: Arc<dyn CompletionProvider>,
        model: String,
    ) -> Self {
        Self {
            messages,
            mutator,
            redaction,
            tokenizer,
            provider,
            model,
        }
    }

    /// Run one query against a conversation and return only the reply
    /// content.
    pub async fn handle(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: String,
    ) -> Result<String> {
        // Best-effort PII redaction of the inbound text before storage.
        let content = self.redaction.redact(&content).await;

        let message_id = self
            .messages
            .create(role, content.clone(), conversation_id)
            .await?;
        let token_delta = self.tokenizer.count_message(role, &content, &self.model) as u64;

        let transcript = self
            .mutator
            .append(conversation_id, &message_id, token_delta)
            .await?;

        let reply = self
            .provider
            .complete(&transcript.messages, &transcript.params)
            .await?;

        let reply_id = self
            .messages
            .create(MessageRole::Assistant, reply.clone(), conversation_id)
            .await?;
        let reply_delta = self
            .tokenizer
            .count_message(MessageRole::Assistant, &reply, &self.model)
            as u64;

        self.mutator
            .append(conversation_id, &reply_id, reply_delta)
            .await?;

        info!(
            "Query against conversation {} complete ({} + {} tokens)",
            conversation_id, token_delta, reply_delta
        );

        Ok(reply)
    }
}
