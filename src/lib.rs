//! Conversation Backend
//!
//! A conversational-AI backend that:
//! - Stores conversations and their ordered message history
//! - Keeps a running token count per conversation, updated incrementally
//! - Reassembles the canonical transcript from the recorded message order
//! - Forwards transcripts to an LLM completion provider and persists replies
//! - Redacts PII from inbound text, best-effort
//!
//! QUERY FLOW:
//! REDACT → STORE USER MSG → APPEND → COMPLETE → STORE REPLY → APPEND → RESPOND

pub mod api;
pub mod error;
pub mod models;
pub mod provider;
pub mod query;
pub mod redaction;
pub mod storage;
pub mod store;
pub mod tokenizer;
pub mod transcript;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use transcript::{ConversationMutator, TranscriptAssembler};
