//! Language model access
//!
//! Handles communication with the LLM backend and pulling JSON objects
//! out of free-form model output.

use crate::config::AiConfig;
use crate::error::AiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Result type for AI operations
type Result<T> = std::result::Result<T, AiError>;

/// Model size class requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    /// Cheap model for summaries
    TextSmall,
    /// Capable model for structured extraction
    TextLarge,
}

/// Text generation backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, model: ModelType, prompt: &str) -> Result<String>;
}

/// Message in a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAiCompatibleClient {
    config: AiConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    /// Create a new client
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| AiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn model_name(&self, model: ModelType) -> &str {
        match model {
            ModelType::TextSmall => &self.config.small_model,
            ModelType::TextLarge => &self.config.large_model,
        }
    }

    /// Send HTTP request to LLM API
    async fn send_request(&self, api_key: &str, model: &str, messages: &[Message]) -> Result<String> {
        let request_body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        // Extract content from response (OpenAI format)
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AiError::Parse("No content in response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    async fn generate(&self, model: ModelType, prompt: &str) -> Result<String> {
        let api_key = self.config.get_api_key().ok_or_else(|| {
            AiError::Unavailable(format!("API key not found in {}", self.config.api_key_env))
        })?;

        let model_name = self.model_name(model);
        debug!("Sending prompt to {} ({:?})", model_name, model);

        let messages = [Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.send_request(&api_key, model_name, &messages).await
    }
}

/// Parse the first JSON object found in model output.
///
/// Tries the whole text, then a fenced code block, then the first balanced
/// `{...}` span.
pub fn parse_json_object_from_text(text: &str) -> Option<Map<String, Value>> {
    let candidates = [
        Some(text.trim().to_string()),
        extract_json_from_markdown(text),
        extract_json_object(text),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&candidate) {
            return Some(map);
        }
    }

    warn!("Could not parse a JSON object from model output");
    None
}

/// Extract JSON from markdown code block
fn extract_json_from_markdown(text: &str) -> Option<String> {
    let patterns = ["```json\n", "```JSON\n", "```\n"];

    for pattern in patterns {
        if let Some(start) = text.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].to_string());
            }
        }
    }
    None
}

/// Extract JSON object from text
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = start;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: String) -> AiConfig {
        AiConfig {
            endpoint,
            api_key_env: "HEDERA_AGENT_TEST_LLM_KEY".to_string(),
            ..AiConfig::default()
        }
    }

    #[test]
    fn test_extract_json_from_markdown() {
        let text = "Here's the response:\n```json\n{\"tokenName\": \"MyToken\"}\n```\n";
        let map = parse_json_object_from_text(text).unwrap();
        assert_eq!(map["tokenName"], "MyToken");
    }

    #[test]
    fn test_extract_json_object() {
        let text = "Some text {\"key\": \"value\"} more text";
        let json = extract_json_object(text).unwrap();
        assert_eq!(json, "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_object_braces_in_strings() {
        let text = r#"result: {"memo": "a } b", "n": {"x": 1}} trailing"#;
        let map = parse_json_object_from_text(text).unwrap();
        assert_eq!(map["memo"], "a } b");
        assert_eq!(map["n"]["x"], 1);
    }

    #[test]
    fn test_parse_plain_json() {
        let map = parse_json_object_from_text("  {\"decimals\": \"8\"}  ").unwrap();
        assert_eq!(map["decimals"], "8");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_json_object_from_text("Just plain text").is_none());
        assert!(parse_json_object_from_text("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_model_type_serialization() {
        assert_eq!(serde_json::to_string(&ModelType::TextLarge).unwrap(), "\"TEXT_LARGE\"");
    }

    #[tokio::test]
    async fn test_generate_without_api_key() {
        std::env::remove_var("HEDERA_AGENT_TEST_LLM_KEY");
        let client = OpenAiCompatibleClient::new(test_config("http://127.0.0.1:9".to_string())).unwrap();
        let err = client.generate(ModelType::TextSmall, "hi").await.unwrap_err();
        assert!(matches!(err, AiError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_generate_uses_model_per_size() {
        std::env::set_var("HEDERA_AGENT_TEST_LLM_KEY_OK", "sk-test");
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"model": "large-model"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"{\"tokenName\":\"X\"}"}}]}"#)
            .create_async()
            .await;

        let config = AiConfig {
            api_key_env: "HEDERA_AGENT_TEST_LLM_KEY_OK".to_string(),
            large_model: "large-model".to_string(),
            ..test_config(format!("{}/v1/chat/completions", server.url()))
        };
        let client = OpenAiCompatibleClient::new(config).unwrap();
        let text = client.generate(ModelType::TextLarge, "extract").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "{\"tokenName\":\"X\"}");
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        std::env::set_var("HEDERA_AGENT_TEST_LLM_KEY_ERR", "sk-test");
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let config = AiConfig {
            api_key_env: "HEDERA_AGENT_TEST_LLM_KEY_ERR".to_string(),
            ..test_config(format!("{}/v1/chat/completions", server.url()))
        };
        let client = OpenAiCompatibleClient::new(config).unwrap();
        let err = client.generate(ModelType::TextSmall, "hi").await.unwrap_err();
        assert!(matches!(err, AiError::Api { status: 429, .. }));
    }
}
