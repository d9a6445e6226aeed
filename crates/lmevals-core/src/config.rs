use crate::model::RunRequest;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Settings for the live provider. The judge model is deployment-wide
/// configuration, never per run.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub judge_model: String,
}

impl ProviderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("LMEVALS_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!("config error: set LMEVALS_API_KEY or OPENROUTER_API_KEY")
            })?;
        Ok(Self {
            base_url: std::env::var("LMEVALS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key,
            judge_model: std::env::var("LMEVALS_JUDGE_MODEL")
                .unwrap_or_else(|_| crate::judge::DEFAULT_JUDGE_MODEL.to_string()),
        })
    }
}

pub fn load_request(path: &Path) -> anyhow::Result<RunRequest> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("config error: cannot read {}: {}", path.display(), e))?;
    let req: RunRequest = serde_yaml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("config error: {}: {}", path.display(), e))?;
    if req.models.is_empty() {
        anyhow::bail!("config error: 'models' must not be empty");
    }
    if req.prompt.trim().is_empty() {
        anyhow::bail!("config error: 'prompt' must not be empty");
    }
    if req.rubric.trim().is_empty() {
        anyhow::bail!("config error: 'rubric' must not be empty");
    }
    if req.user.trim().is_empty() {
        anyhow::bail!("config error: 'user' must not be empty");
    }
    Ok(req)
}

pub fn write_sample_request(path: &Path) -> anyhow::Result<()> {
    std::fs::write(
        path,
        r#"models:
  - "openai/gpt-4o-mini"
  - "anthropic/claude-3.5-haiku"
prompt: "How many r's in Strawberry?"
rubric: "three r's = 1, else = 0"
title: "Strawberry"
user: "demo"
"#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_request_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        write_sample_request(&path).unwrap();
        let req = load_request(&path).unwrap();
        assert_eq!(req.models.len(), 2);
        assert_eq!(req.user, "demo");
        assert_eq!(req.title, "Strawberry");
    }

    #[test]
    fn test_empty_models_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "models: []\nprompt: p\nrubric: r\nuser: u\n",
        )
        .unwrap();
        let err = load_request(&path).unwrap_err();
        assert!(err.to_string().starts_with("config error:"));
    }

    #[test]
    fn test_title_defaults_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "models: [\"m\"]\nprompt: p\nrubric: r\nuser: u\n",
        )
        .unwrap();
        let req = load_request(&path).unwrap();
        assert_eq!(req.title, "");
    }
}
