use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{error::BackendError, server_config::BackendConfig, HttpClient};

use super::TextGenerator;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

/// Anthropic `/v1/messages` client
pub struct AnthropicClient {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicClient {
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
            timeout,
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let resp = self
            .http_client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "system": system,
                "messages": [
                    {
                        "role": "user",
                        "content": user
                    }
                ]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Anthropic API returned {}: {}", status, body);
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(BackendError::from_status(status, message));
        }

        let parsed = resp.json::<MessagesResponse>().await.map_err(|e| {
            BackendError::Unavailable(format!("Could not parse Anthropic response: {e}"))
        })?;

        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Anthropic response was truncated at {} tokens", self.max_tokens);
        }

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::server_config::Provider;

    fn client(server: &mockito::Server) -> AnthropicClient {
        let backend = BackendConfig {
            provider: Provider::Anthropic,
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key_env: "UNUSED".to_string(),
            endpoint: Some(format!("{}/v1/messages", server.url())),
            temperature: 0.2,
            max_tokens: 1400,
            json_mode: false,
        };
        AnthropicClient::new(
            HttpClient::new(),
            &backend,
            "ak-test".to_string(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "ak-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJsonString(
                r#"{"system": "be brief", "max_tokens": 1400}"#.into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content": [{"type": "text", "text": "Executive Summary\n"}, {"type": "text", "text": "All good."}], "stop_reason": "end_turn"}"#,
            )
            .create_async()
            .await;

        let text = client(&server)
            .generate_text("be brief", "report")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(text, "Executive Summary\nAll good.");
    }

    #[tokio::test]
    async fn test_auth_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#)
            .create_async()
            .await;

        let err = client(&server).generate_text("s", "u").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Rejected {
                status: 401,
                message: "invalid x-api-key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_blank_text_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content": [{"type": "text", "text": "  "}]}"#)
            .create_async()
            .await;

        let err = client(&server).generate_text("s", "u").await.unwrap_err();
        assert_eq!(err, BackendError::EmptyResponse);
    }
}
