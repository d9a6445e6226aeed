use super::CompletionClient;
use crate::errors::EvalError;
use async_trait::async_trait;

type Responder = dyn Fn(&str, &str) -> Result<String, EvalError> + Send + Sync;

/// Scripted client for tests and the CLI's offline mode. The responder sees
/// (model, prompt) and may fail to exercise the sentinel paths.
pub struct FakeClient {
    respond: Box<Responder>,
}

impl FakeClient {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, EvalError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
        }
    }

    /// Always answers with the same text, whatever the model or prompt.
    pub fn canned(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, EvalError> {
        (self.respond)(model, prompt)
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
