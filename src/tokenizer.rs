//! Token counting
//!
//! Token accounting is incremental: each message is counted once at
//! creation and the delta is added to the conversation's running total.
//! Nothing ever re-tokenizes stored content on read.

use crate::models::MessageRole;
use tracing::warn;

/// Default model hint used when the caller supplies none.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub trait Tokenizer: Send + Sync {
    /// Count tokens in a piece of text. Unknown model hints fall back to
    /// the default encoding rather than failing.
    fn count(&self, text: &str, model: &str) -> usize;

    /// Token cost of one message: content tokens plus the fixed overhead
    /// of its role label.
    fn count_message(&self, role: MessageRole, content: &str, model: &str) -> usize {
        self.count(content, model) + self.count(role.as_str(), model)
    }
}

/// Estimating tokenizer: a per-model chars-per-token ratio. Close enough
/// for the running-count bookkeeping this service does, and the counts
/// stay self-consistent because the same estimator produced every delta.
pub struct HeuristicTokenizer;

impl HeuristicTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

fn chars_per_token(model: &str) -> Option<usize> {
    if model.starts_with("gpt-4") || model.starts_with("gpt-3.5") {
        Some(4)
    } else if model.starts_with("text-davinci") {
        Some(4)
    } else {
        None
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str, model: &str) -> usize {
        let ratio = chars_per_token(model).unwrap_or_else(|| {
            warn!("Unknown model {} for token counting, using default encoding", model);
            4
        });

        (text.len() + ratio - 1) / ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_rounds_up() {
        let tokenizer = HeuristicTokenizer::new();
        assert_eq!(tokenizer.count("", DEFAULT_MODEL), 0);
        assert_eq!(tokenizer.count("a", DEFAULT_MODEL), 1);
        assert_eq!(tokenizer.count("Hello", DEFAULT_MODEL), 2);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let tokenizer = HeuristicTokenizer::new();
        let known = tokenizer.count("some text here", DEFAULT_MODEL);
        let unknown = tokenizer.count("some text here", "mystery-model-9000");
        assert_eq!(known, unknown);
    }

    #[test]
    fn test_message_count_adds_role_overhead() {
        let tokenizer = HeuristicTokenizer::new();
        let content_only = tokenizer.count("Hello", DEFAULT_MODEL);
        let with_role =
            tokenizer.count_message(MessageRole::User, "Hello", DEFAULT_MODEL);
        assert_eq!(
            with_role,
            content_only + tokenizer.count("user", DEFAULT_MODEL)
        );
    }
}
