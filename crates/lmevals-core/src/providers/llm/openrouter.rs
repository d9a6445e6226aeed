use super::CompletionClient;
use crate::config::ProviderConfig;
use crate::errors::EvalError;
use async_trait::async_trait;
use serde_json::json;

/// Live client for the OpenRouter chat-completions endpoint.
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(cfg: &ProviderConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn chat(&self, body: serde_json::Value) -> Result<String, EvalError> {
        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        // Read the body as text first: the upstream returns non-JSON bodies
        // on some errors, and we want the raw text for diagnostics.
        let raw = resp.text().await?;
        if !status.is_success() {
            return Err(EvalError::Api {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&raw).map_err(|_| EvalError::MalformedResponse { raw })?;
        let text = parsed
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or(EvalError::InvalidCompletionShape)?;
        Ok(text.to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, EvalError> {
        self.chat(json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        }))
        .await
    }

    async fn complete_json(&self, model: &str, prompt: &str) -> Result<String, EvalError> {
        self.chat(json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": { "type": "json_object" },
        }))
        .await
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}
