use std::collections::HashMap;

/// Injected model → display-icon table. The orchestrator resolves the winning
/// model's icon through this so it stays agnostic of presentation concerns;
/// models absent from the table get an empty icon.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    icons: HashMap<String, String>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: &str, icon: &str) {
        self.icons.insert(model.to_string(), icon.to_string());
    }

    pub fn with_icon(mut self, model: &str, icon: &str) -> Self {
        self.insert(model, icon);
        self
    }

    pub fn icon(&self, model: &str) -> &str {
        self.icons.get(model).map(String::as_str).unwrap_or("")
    }

    /// The stock OpenRouter model set.
    pub fn defaults() -> Self {
        const ICON_OPENAI: &str = "https://static.vecteezy.com/system/resources/previews/021/059/827/non_2x/chatgpt-logo-chat-gpt-icon-on-white-background-free-vector.jpg";
        const ICON_GOOGLE: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/3/3c/Google_Favicon_2025.svg/330px-Google_Favicon_2025.svg.png";
        const ICON_ANTHROPIC: &str = "https://openrouter.ai/images/icons/Anthropic.svg";
        const ICON_XAI: &str =
            "https://encrypted-tbn0.gstatic.com/images?q=tbn:ANd9GcROcXRdeEoeB-Kl449XzrchCvGwxDaTRltKSg&s";
        const ICON_META: &str = "https://res.cloudinary.com/apideck/image/upload/w_196,f_auto/v1677940393/marketplaces/ckhg56iu1mkpc0b66vj7fsj3o/listings/meta_nnmll6.webp";
        const ICON_DEEPSEEK: &str =
            "https://logosandtypes.com/wp-content/uploads/2025/02/Deepseek.png";

        Self::new()
            .with_icon("openai/gpt-4o-mini", ICON_OPENAI)
            .with_icon("openai/chatgpt-4o-latest", ICON_OPENAI)
            .with_icon("google/gemini-2.5-flash-preview-05-20", ICON_GOOGLE)
            .with_icon("google/gemini-2.5-pro-preview", ICON_GOOGLE)
            .with_icon("anthropic/claude-3.5-haiku", ICON_ANTHROPIC)
            .with_icon("anthropic/claude-sonnet-4", ICON_ANTHROPIC)
            .with_icon("x-ai/grok-3-mini-beta", ICON_XAI)
            .with_icon("x-ai/grok-3-beta", ICON_XAI)
            .with_icon("meta-llama/llama-3.3-70b-instruct", ICON_META)
            .with_icon("deepseek/deepseek-chat-v3-0324", ICON_DEEPSEEK)
            .with_icon("perplexity/r1-1776", ICON_DEEPSEEK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_stock_models() {
        let catalog = ModelCatalog::defaults();
        assert!(!catalog.icon("openai/gpt-4o-mini").is_empty());
        assert!(!catalog.icon("anthropic/claude-3.5-haiku").is_empty());
    }

    #[test]
    fn test_unknown_model_gets_empty_icon() {
        let catalog = ModelCatalog::defaults();
        assert_eq!(catalog.icon("nobody/no-such-model"), "");
    }
}
