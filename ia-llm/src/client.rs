use crate::error::{LlmError, Result};
use crate::completions;
use crate::traits::ChatModel;
use crate::types::{ChatMessage, ChatResponse, ToolDefinition};
use async_trait::async_trait;
use std::time::Duration;

const MAX_TOOL_NAME_LEN: usize = 64;

#[derive(Clone)]
pub struct LlmClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    #[tracing::instrument(level = "debug", skip_all, fields(model = %model, base_url = %base_url))]
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LlmError::InvalidInput("api key is required".to_string()));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(LlmError::InvalidInput("model is required".to_string()));
        }
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::InvalidInput(format!(
                "base url must be http(s): {base_url:?}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        completions::complete(
            &self.client,
            &self.completions_url(),
            &self.api_key,
            &self.model,
            messages,
            tools,
        )
        .await
    }
}

/// Tool names must satisfy `^[a-zA-Z0-9_-]{1,64}$` for every OpenAI-compatible provider.
pub fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LlmError::InvalidInput("tool name is empty".to_string()));
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} exceeds {MAX_TOOL_NAME_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_follow_provider_charset() {
        assert!(validate_tool_name("get_row_count").is_ok());
        assert!(validate_tool_name("search-orders").is_ok());
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name("shell.execute").is_err());
        assert!(validate_tool_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn new_rejects_blank_key_and_bad_base_url() {
        let timeout = Duration::from_secs(5);
        assert!(LlmClient::new("https://api.cerebras.ai/v1", "   ", "llama-3.3-70b", timeout).is_err());
        assert!(LlmClient::new("api.cerebras.ai/v1", "key", "llama-3.3-70b", timeout).is_err());
        assert!(LlmClient::new("https://api.cerebras.ai/v1", "key", " ", timeout).is_err());
    }

    #[test]
    fn completions_url_strips_trailing_slash() {
        let client = LlmClient::new(
            "https://api.cerebras.ai/v1/",
            "key",
            "llama-3.3-70b",
            Duration::from_secs(5),
        )
        .expect("client builds");
        assert_eq!(client.base_url(), "https://api.cerebras.ai/v1");
        assert_eq!(
            client.completions_url(),
            "https://api.cerebras.ai/v1/chat/completions"
        );
        assert_eq!(client.model(), "llama-3.3-70b");
    }
}
