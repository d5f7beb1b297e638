//! Chat-completions client.

use deck_core::{Config, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model every request is sent to.
pub const MODEL: &str = "gpt-4";
/// Sampling temperature for every request.
pub const TEMPERATURE: f64 = 0.7;
/// Upper bound on generated tokens for every request.
pub const MAX_TOKENS: u32 = 1200;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of a `POST /chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// A request with the fixed model, temperature, and token limit.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: MODEL.to_string(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice. A null content counts as an empty reply.
    fn into_first_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| Error::ServiceFailure("response contained no choices".to_string()))
    }
}

/// A language-model service: one request in, the first choice's text out.
pub trait ChatCompletion {
    fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiClient {
    /// Create a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_secs))
            .build()
            .map_err(|e| Error::ServiceFailure(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.openai.base_url),
        })
    }

    /// URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChatCompletion for OpenAiClient {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        log::debug!(
            "POST {} (model {}, {} messages)",
            self.endpoint,
            request.model,
            request.messages.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| Error::ServiceFailure(e.to_string()))?;

        let status = response.status();
        log::debug!("Response status: {}", status);

        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::ServiceFailure(format!("openai http {}: {}", status, text)));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| Error::ServiceFailure(format!("Failed to decode response: {}", e)))?;

        body.into_first_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.7,
                "max_tokens": 1200
            })
        );
    }

    #[test]
    fn test_first_choice_is_returned() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"first"}},{"index":1,"message":{"role":"assistant","content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_first_content().unwrap(), "first");
    }

    #[test]
    fn test_null_content_is_empty() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert_eq!(body.into_first_content().unwrap(), "");
    }

    #[test]
    fn test_no_choices_is_service_failure() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = body.into_first_content().unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = Config::resolve(
            Some("OPENAI_API_KEY = \"sk\"\n[security]\naccess_key = \"k\"\n[openai]\nbase_url = \"http://localhost:9/v1\"\n"),
            |_| None,
        )
        .unwrap();
        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn test_unreachable_service_is_retryable() {
        let config = Config::resolve(
            Some("OPENAI_API_KEY = \"sk\"\n[security]\naccess_key = \"k\"\n[openai]\nbase_url = \"http://127.0.0.1:1\"\ntimeout_secs = 2\n"),
            |_| None,
        )
        .unwrap();
        let client = OpenAiClient::new(&config).unwrap();
        let err = client
            .complete(&ChatRequest::new(vec![ChatMessage::user("hi")]))
            .unwrap_err();
        assert!(matches!(err, Error::ServiceFailure(_)));
    }
}
