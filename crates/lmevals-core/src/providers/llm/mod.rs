use crate::errors::EvalError;
use async_trait::async_trait;

/// A hosted chat-completion endpoint, routed by model identifier.
///
/// No retry at this layer; retries and failure recovery belong to the trial
/// runner.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue a single request with `prompt` as the sole user message and
    /// return the raw completion text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, EvalError>;

    /// Like [`complete`](Self::complete), but asks the provider for
    /// structured JSON output. Providers without a JSON mode fall back to a
    /// plain completion.
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<String, EvalError> {
        self.complete(model, prompt).await
    }

    fn provider_name(&self) -> &'static str;
}

pub mod fake;
pub mod openrouter;
