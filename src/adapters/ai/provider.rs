//! Provider selection. A closed set of provider variants behind one `AiPort`.

use crate::adapters::ai::gemini_adapter::{GEMINI_BASE_URL, GeminiAdapter};
use crate::adapters::ai::openai_adapter::{GROQ_BASE_URL, OPENAI_BASE_URL, OpenAiAdapter};
use crate::domain::DomainError;
use crate::ports::{AiPort, CompletionRequest, ImageInput};
use crate::shared::config::AppConfig;
use std::time::Duration;
use tracing::{info, warn};

/// HTTP timeout for provider calls.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAi,
    Groq,
}

impl ProviderKind {
    /// Unknown names fall back to Gemini.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "" => ProviderKind::Gemini,
            "openai" => ProviderKind::OpenAi,
            "groq" => ProviderKind::Groq,
            other => {
                warn!(provider = other, "unknown AI provider, falling back to gemini");
                ProviderKind::Gemini
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::OpenAi => "gpt-4.1-mini",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => GEMINI_BASE_URL,
            ProviderKind::OpenAi => OPENAI_BASE_URL,
            ProviderKind::Groq => GROQ_BASE_URL,
        }
    }
}

/// The configured provider. Adding a provider means adding a variant here.
pub enum ProviderClient {
    /// Full vision + chat (default).
    Gemini(GeminiAdapter),
    /// Full vision + chat.
    OpenAi(OpenAiAdapter),
    /// Chat only.
    Groq(OpenAiAdapter),
}

impl ProviderClient {
    pub fn new(kind: ProviderKind, api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| kind.default_model().to_string());
        let base_url = base_url.unwrap_or_else(|| kind.default_base_url().to_string());
        match kind {
            ProviderKind::Gemini => ProviderClient::Gemini(GeminiAdapter::new(
                base_url,
                api_key,
                model,
                PROVIDER_TIMEOUT,
            )),
            ProviderKind::OpenAi => ProviderClient::OpenAi(OpenAiAdapter::new(
                "openai",
                base_url,
                api_key,
                model,
                true,
                PROVIDER_TIMEOUT,
            )),
            ProviderKind::Groq => ProviderClient::Groq(OpenAiAdapter::new(
                "groq",
                base_url,
                api_key,
                model,
                false,
                PROVIDER_TIMEOUT,
            )),
        }
    }

    /// Build the provider named by `ai_provider`, with its key from config.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let kind = ProviderKind::parse(cfg.ai_provider.as_deref().unwrap_or("gemini"));
        let api_key = match kind {
            ProviderKind::Gemini => cfg.gemini_api_key.clone(),
            ProviderKind::OpenAi => cfg.openai_api_key.clone(),
            ProviderKind::Groq => cfg.groq_api_key.clone(),
        };
        if api_key.is_none() {
            warn!(provider = kind.name(), "AI API key not set; replies will fail until configured");
        }
        let client = Self::new(
            kind,
            api_key.unwrap_or_default(),
            cfg.ai_model.clone(),
            cfg.ai_base_url.clone(),
        );
        info!(provider = kind.name(), model = %client.model(), "AI provider selected");
        client
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderClient::Gemini(_) => ProviderKind::Gemini,
            ProviderClient::OpenAi(_) => ProviderKind::OpenAi,
            ProviderClient::Groq(_) => ProviderKind::Groq,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderClient::Gemini(a) => a.model(),
            ProviderClient::OpenAi(a) | ProviderClient::Groq(a) => a.model(),
        }
    }

    fn inner(&self) -> &dyn AiPort {
        match self {
            ProviderClient::Gemini(a) => a,
            ProviderClient::OpenAi(a) | ProviderClient::Groq(a) => a,
        }
    }
}

#[async_trait::async_trait]
impl AiPort for ProviderClient {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn supports_vision(&self) -> bool {
        self.inner().supports_vision()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        self.inner().complete(request).await
    }

    async fn complete_with_image(
        &self,
        request: &CompletionRequest,
        image: &ImageInput,
    ) -> Result<String, DomainError> {
        self.inner().complete_with_image(request, image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_names() {
        assert_eq!(ProviderKind::parse("OpenAI"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("groq"), ProviderKind::Groq);
        assert_eq!(ProviderKind::parse("claude"), ProviderKind::Gemini);
    }

    #[test]
    fn test_only_groq_lacks_vision() {
        let make = |kind| ProviderClient::new(kind, "k".into(), None, None);
        assert!(make(ProviderKind::Gemini).supports_vision());
        assert!(make(ProviderKind::OpenAi).supports_vision());
        assert!(!make(ProviderKind::Groq).supports_vision());
        assert_eq!(make(ProviderKind::Groq).model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_from_config_picks_matching_key() {
        let cfg = AppConfig {
            ai_provider: Some("openai".into()),
            openai_api_key: Some("sk".into()),
            ai_model: Some("gpt-4o".into()),
            ..Default::default()
        };
        let client = ProviderClient::from_config(&cfg);
        assert_eq!(client.kind(), ProviderKind::OpenAi);
        assert_eq!(client.model(), "gpt-4o");
    }
}
