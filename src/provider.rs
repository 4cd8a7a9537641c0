//! Completion provider boundary
//!
//! The provider is a black box: ordered transcript + conversation params
//! in, reply text out. Failures surface as the distinguished `Provider`
//! error kind so callers can tell "provider unavailable" apart from
//! "bad input".

use crate::error::ServiceError;
use crate::models::{Params, TranscriptMessage};
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a reply for the ordered transcript. The params map is
    /// passed through opaquely.
    async fn complete(&self, messages: &[TranscriptMessage], params: &Params)
        -> Result<String>;
}

/// OpenAI-style chat-completions client over a pooled connection.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            // The upstream contract defines no timeout; this bounds the
            // otherwise-unbounded call at the boundary.
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    fn build_request(&self, messages: &[TranscriptMessage], params: &Params) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect::<Vec<_>>(),
        });

        // Conversation params override provider defaults, opaquely.
        if let Some(map) = body.as_object_mut() {
            for (key, value) in params {
                map.insert(key.clone(), json!(value));
            }
        }

        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[TranscriptMessage],
        params: &Params,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ServiceError::Provider(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let body = self.build_request(messages, params);

        info!("Calling completion provider ({} messages)", messages.len());

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                ServiceError::Provider(format!("Completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Provider error response ({}): {}", status, error_text);
            return Err(ServiceError::Provider(format!(
                "Provider returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse provider response: {}", e);
            ServiceError::Provider(format!("Malformed provider response: {}", e))
        })?;

        let reply = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| {
                ServiceError::Provider("Provider returned no choices".to_string())
            })?;

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use std::collections::HashMap;

    #[test]
    fn test_request_carries_params_and_order() {
        let provider = OpenAiProvider::new("key".to_string(), "gpt-3.5-turbo".to_string());
        let messages = vec![
            TranscriptMessage {
                id: "m1".to_string(),
                role: MessageRole::User,
                content: "Hello".to_string(),
            },
            TranscriptMessage {
                id: "m2".to_string(),
                role: MessageRole::Assistant,
                content: "Hi there".to_string(),
            },
        ];
        let params = HashMap::from([("temperature".to_string(), 0.5)]);

        let body = provider.build_request(&messages, &params);

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["messages"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_provider_error() {
        let provider = OpenAiProvider::new(String::new(), "gpt-3.5-turbo".to_string());
        let err = provider.complete(&[], &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Provider(_)));
    }
}
