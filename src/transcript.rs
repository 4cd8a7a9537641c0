//! Transcript assembly and the append operation
//!
//! The conversation record stores an append-only list of message ids; the
//! messages themselves live in their own collection. Assembly joins the
//! two: one bulk message fetch, then a sort by each message's position in
//! the recorded order. The transcript therefore follows caller-observed
//! append order, never storage order and never message id.

use crate::models::{Conversation, Message, Transcript, TranscriptMessage};
use crate::store::{ConversationStore, MessageStore};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

//
// ================= Assembler =================
//

pub struct TranscriptAssembler {
    conversations: Arc<ConversationStore>,
    messages: Arc<MessageStore>,
}

impl TranscriptAssembler {
    pub fn new(conversations: Arc<ConversationStore>, messages: Arc<MessageStore>) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    /// Reassemble the full ordered transcript of a conversation.
    ///
    /// An id in the order list with no stored message is silently omitted
    /// (the join simply produces nothing for it). A stored message missing
    /// from the order list ranks last, stably — unreachable in normal
    /// operation because every append writes the message and its order
    /// entry together.
    pub async fn assemble(&self, conversation_id: &str) -> Result<Transcript> {
        let conversation = self.conversations.get(conversation_id).await?;
        let mut messages = self.messages.find_by_conversation(conversation_id).await?;

        let rank: HashMap<&str, usize> = conversation
            .message_order
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();

        messages.sort_by_key(|message| {
            rank.get(message.id.as_str()).copied().unwrap_or(usize::MAX)
        });

        debug!(
            "Assembled transcript for {}: {} of {} ordered ids resolved",
            conversation_id,
            messages.len(),
            conversation.message_order.len()
        );

        Ok(build_transcript(conversation, messages))
    }
}

fn build_transcript(conversation: Conversation, messages: Vec<Message>) -> Transcript {
    Transcript {
        id: conversation.id,
        name: conversation.name,
        params: conversation.params,
        tokens: conversation.tokens,
        messages: messages
            .into_iter()
            .map(|message| TranscriptMessage {
                id: message.id,
                role: message.role,
                content: message.content,
            })
            .collect(),
    }
}

//
// ================= Mutator =================
//

/// The atomic "append message" operation: one conditional storage update
/// adds the id and token delta, then the transcript is reassembled.
pub struct ConversationMutator {
    conversations: Arc<ConversationStore>,
    assembler: Arc<TranscriptAssembler>,
}

impl ConversationMutator {
    pub fn new(
        conversations: Arc<ConversationStore>,
        assembler: Arc<TranscriptAssembler>,
    ) -> Self {
        Self {
            conversations,
            assembler,
        }
    }

    /// Append a message id and its token delta, returning the updated
    /// transcript. The update itself is atomic; the trailing reassembly is
    /// a separate read and may observe a concurrent writer's later append.
    pub async fn append(
        &self,
        conversation_id: &str,
        message_id: &str,
        token_delta: u64,
    ) -> Result<Transcript> {
        self.conversations
            .apply_append(conversation_id, message_id, token_delta)
            .await?;

        self.assembler.assemble(conversation_id).await
    }
}
