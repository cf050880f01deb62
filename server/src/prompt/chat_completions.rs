use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error::BackendError, server_config::BackendConfig, HttpClient};

use super::TextGenerator;

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<PromptUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    /// OpenAI nests the error, Mistral does not
    Wrapped { error: ChatApiError },
    Error(ChatApiError),
}

/// OpenAI-compatible `/v1/chat/completions` client, used for OpenAI and Mistral
pub struct ChatCompletionsClient {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    json_mode: bool,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        http_client: HttpClient,
        backend: &BackendConfig,
        api_key: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            endpoint: backend.endpoint().to_string(),
            api_key,
            model: backend.model.clone(),
            temperature: backend.temperature,
            max_tokens: backend.max_tokens,
            json_mode: backend.json_mode,
            timeout,
        }
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        let mut body = json!({
            "model": &self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {
                    "role": "system",
                    "content": system
                },
                {
                    "role": "user",
                    "content": user
                }
            ]
        });
        if self.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&self.request_body(system, user))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Chat API returned {}: {}", status, body);
            return Err(BackendError::from_status(status, body));
        }

        let parsed = resp
            .json::<ChatApiResponseOrError>()
            .await
            .map_err(|e| BackendError::Unavailable(format!("Could not parse chat response: {e}")))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Response(parsed) => parsed,
            ChatApiResponseOrError::Wrapped { error } | ChatApiResponseOrError::Error(error) => {
                tracing::error!("Chat API error: {:?}", error);
                return Err(BackendError::Rejected {
                    status: status.as_u16(),
                    message: error.message,
                });
            }
        };

        if let Some(usage) = &parsed.usage {
            tracing::debug!("Chat API used {} tokens", usage.total_tokens);
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(BackendError::EmptyResponse)
    }
}
