//! PII redaction boundary
//!
//! Best-effort by policy: a redaction failure must never fail the request,
//! so every error path degrades to the original text with a warning. This
//! is a deliberate availability-over-safety tradeoff.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[async_trait::async_trait]
pub trait RedactionService: Send + Sync {
    /// Redact PII from text. Infallible from the caller's point of view.
    async fn redact(&self, text: &str) -> String;
}

/// Pass-through used when no redaction endpoint is configured, and in
/// tests.
pub struct NoopRedaction;

#[async_trait::async_trait]
impl RedactionService for NoopRedaction {
    async fn redact(&self, text: &str) -> String {
        text.to_string()
    }
}

#[derive(Serialize)]
struct RedactRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct RedactResponse {
    redacted: String,
}

/// Client for an external HTTP redaction service.
pub struct HttpRedaction {
    client: Client,
    endpoint: String,
}

impl HttpRedaction {
    pub fn new(endpoint: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, endpoint }
    }
}

#[async_trait::async_trait]
impl RedactionService for HttpRedaction {
    async fn redact(&self, text: &str) -> String {
        let result = self
            .client
            .post(&self.endpoint)
            .json(&RedactRequest { text })
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(
                    "Redaction service returned {}, storing unredacted text",
                    response.status()
                );
                return text.to_string();
            }
            Err(e) => {
                warn!("Redaction service unreachable ({}), storing unredacted text", e);
                return text.to_string();
            }
        };

        match response.json::<RedactResponse>().await {
            Ok(body) => body.redacted,
            Err(e) => {
                warn!("Malformed redaction response ({}), storing unredacted text", e);
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_is_identity() {
        let redaction = NoopRedaction;
        assert_eq!(redaction.redact("call me at 555-0100").await, "call me at 555-0100");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades_to_identity() {
        // Nothing listens here; the request fails fast and the original
        // text comes back.
        let redaction = HttpRedaction::new("http://127.0.0.1:1/redact".to_string());
        assert_eq!(redaction.redact("hello").await, "hello");
    }
}
