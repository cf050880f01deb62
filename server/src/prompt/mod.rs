pub mod anthropic;
pub mod chat_completions;
pub mod executive_report;
pub mod insight_extraction;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::BackendError,
    server_config::{BackendConfig, Provider},
    HttpClient,
};

pub use anthropic::AnthropicClient;
pub use chat_completions::ChatCompletionsClient;

/// An opaque text-completion service. One call, no retries.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, BackendError>;
}

/// Build the client for a configured backend. Fails when its API key is not set.
pub fn build_generator(
    backend: &BackendConfig,
    http_client: HttpClient,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn TextGenerator>> {
    let api_key = backend.api_key()?;
    let generator: Arc<dyn TextGenerator> = match backend.provider {
        Provider::OpenAi | Provider::Mistral => Arc::new(ChatCompletionsClient::new(
            http_client,
            backend,
            api_key,
            timeout,
        )),
        Provider::Anthropic => Arc::new(AnthropicClient::new(http_client, backend, api_key, timeout)),
    };
    tracing::info!(
        "Using {} model {} at {}",
        backend.provider,
        backend.model,
        backend.endpoint()
    );
    Ok(generator)
}

/// Strip a single surrounding Markdown code fence, if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string, e.g. ```json
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("```{}"), "```{}");
    }
}
