//! Provider selection, resolved once at startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{ProviderError, ProviderResult};
use crate::gemini::{GeminiConfig, GeminiProvider};
use crate::openai::{OmniModeration, OpenAiConfig, OpenAiProvider};
use crate::provider::ContentAnalysisProvider;

/// Backend used for description, metadata and transcription.
#[derive(Debug, Clone)]
pub enum ContentBackend {
    Gemini(GeminiConfig),
    OpenAi(OpenAiConfig),
}

/// Where moderation scores come from.
#[derive(Debug, Clone)]
pub enum ModerationSource {
    /// The content backend scores images itself
    Primary,
    /// OpenAI's omni moderation endpoint
    OpenAiOmni(OpenAiConfig),
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub content: ContentBackend,
    pub moderation: ModerationSource,
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ProviderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = lookup("PROVIDER_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        let gemini = || {
            let mut config = GeminiConfig::new(lookup("GEMINI_API_KEY").unwrap_or_default());
            if let Some(model) = lookup("GEMINI_MODEL") {
                config.model = model;
            }
            if let Some(base_url) = lookup("GEMINI_BASE_URL") {
                config.base_url = base_url;
            }
            config.timeout = timeout;
            config
        };

        let openai = || {
            let mut config = OpenAiConfig::new(lookup("OPENAI_API_KEY").unwrap_or_default());
            if let Some(model) = lookup("OPENAI_VISION_MODEL") {
                config.vision_model = model;
            }
            if let Some(model) = lookup("OPENAI_TEXT_MODEL") {
                config.text_model = model;
            }
            if let Some(model) = lookup("OPENAI_TRANSCRIBE_MODEL") {
                config.transcribe_model = model;
            }
            if let Some(base_url) = lookup("OPENAI_BASE_URL") {
                config.base_url = base_url;
            }
            config.timeout = timeout;
            config
        };

        let content = match lookup("CONTENT_PROVIDER")
            .unwrap_or_else(|| "gemini".to_string())
            .to_lowercase()
            .as_str()
        {
            "gemini" => ContentBackend::Gemini(gemini()),
            "openai" => ContentBackend::OpenAi(openai()),
            other => {
                return Err(ProviderError::config(format!(
                    "unknown CONTENT_PROVIDER '{other}' (expected gemini or openai)"
                )))
            }
        };

        let moderation = match lookup("MODERATION_PROVIDER")
            .unwrap_or_else(|| "primary".to_string())
            .to_lowercase()
            .as_str()
        {
            "primary" => ModerationSource::Primary,
            "openai-omni" => ModerationSource::OpenAiOmni(openai()),
            other => {
                return Err(ProviderError::config(format!(
                    "unknown MODERATION_PROVIDER '{other}' (expected primary or openai-omni)"
                )))
            }
        };

        Ok(Self {
            content,
            moderation,
        })
    }
}

/// Construct the single provider shared by every task.
pub fn build_provider(config: ProviderConfig) -> ProviderResult<Arc<dyn ContentAnalysisProvider>> {
    let primary: Box<dyn ContentAnalysisProvider> = match config.content {
        ContentBackend::Gemini(c) => Box::new(GeminiProvider::new(c)?),
        ContentBackend::OpenAi(c) => Box::new(OpenAiProvider::new(c)?),
    };

    let provider: Arc<dyn ContentAnalysisProvider> = match config.moderation {
        ModerationSource::Primary => Arc::from(primary),
        ModerationSource::OpenAiOmni(c) => {
            Arc::new(OmniModeration::new(primary, OpenAiProvider::new(c)?))
        }
    };

    info!(provider = provider.name(), "Content analysis provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_gemini_with_primary_moderation() {
        let config = ProviderConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g")])).unwrap();
        match config.content {
            ContentBackend::Gemini(c) => {
                assert_eq!(c.api_key, "g");
                assert_eq!(c.model, "gemini-2.0-flash");
                assert!(c.timeout.is_none());
            }
            other => panic!("unexpected backend: {other:?}"),
        }
        assert!(matches!(config.moderation, ModerationSource::Primary));
    }

    #[test]
    fn test_openai_with_omni_moderation() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("CONTENT_PROVIDER", "OpenAI"),
            ("MODERATION_PROVIDER", "openai-omni"),
            ("OPENAI_API_KEY", "sk"),
            ("OPENAI_TEXT_MODEL", "gpt-4o-mini"),
            ("PROVIDER_TIMEOUT_SECS", "45"),
        ]))
        .unwrap();

        match config.content {
            ContentBackend::OpenAi(c) => {
                assert_eq!(c.text_model, "gpt-4o-mini");
                assert_eq!(c.timeout, Some(Duration::from_secs(45)));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
        assert!(matches!(config.moderation, ModerationSource::OpenAiOmni(_)));

        let provider = build_provider(ProviderConfig::from_lookup(lookup(&[
            ("CONTENT_PROVIDER", "openai"),
            ("MODERATION_PROVIDER", "openai-omni"),
            ("OPENAI_API_KEY", "sk"),
        ]))
        .unwrap())
        .unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[("CONTENT_PROVIDER", "llama")])).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_build_without_key_fails() {
        let config = ProviderConfig::from_lookup(lookup(&[])).unwrap();
        assert!(build_provider(config).is_err());
    }
}
