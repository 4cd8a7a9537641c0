//! Core data models for the conversation backend

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upper bound on conversation names, enforced at the boundary.
pub const MAX_NAME_LEN: usize = 200;

/// Tunable provider parameters, passed through opaquely
/// (e.g. `{"temperature": 0.7}`).
pub type Params = HashMap<String, f64>;

//
// ================= Roles =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Function,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Function => "function",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Message =================
//

/// One role-tagged unit of conversation content. Immutable once created;
/// deleted only as part of conversation deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub conversation_id: String,
}

//
// ================= Conversation =================
//

/// The conversation record as stored. `tokens` and `message_order` are
/// mutated only through the append path, never settable by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub tokens: u64,
    /// Canonical append order of message ids.
    #[serde(default)]
    pub message_order: Vec<String>,
}

/// Listing view: order list and content excluded for payload size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub params: Params,
    pub tokens: u64,
}

impl Conversation {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            params: self.params.clone(),
            tokens: self.tokens,
        }
    }
}

//
// ================= Transcript =================
//

/// A single transcript entry (message without its owning-conversation id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
}

/// The full conversation with its messages in canonical append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub name: String,
    pub params: Params,
    pub tokens: u64,
    pub messages: Vec<TranscriptMessage>,
}

//
// ================= Write Payloads =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationCreate {
    pub name: String,
    #[serde(default)]
    pub params: Params,
}

/// Partial metadata update: only supplied fields are overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization_is_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");

        let role: MessageRole = serde_json::from_str("\"function\"").unwrap();
        assert_eq!(role, MessageRole::Function);
    }

    #[test]
    fn test_conversation_defaults_on_deserialize() {
        let conv: Conversation =
            serde_json::from_str(r#"{"id": "c1", "name": "chat"}"#).unwrap();
        assert_eq!(conv.tokens, 0);
        assert!(conv.params.is_empty());
        assert!(conv.message_order.is_empty());
    }

    #[test]
    fn test_update_payload_partial() {
        let update: ConversationUpdate =
            serde_json::from_str(r#"{"name": "renamed"}"#).unwrap();
        assert_eq!(update.name.as_deref(), Some("renamed"));
        assert!(update.params.is_none());
    }
}
