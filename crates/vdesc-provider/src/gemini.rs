//! Gemini `generateContent` provider.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vdesc_models::{FrameGrid, ModerationScores, VideoMetadata};

use crate::error::{ProviderError, ProviderResult};
use crate::prompts::{
    clean_narrative, metadata_prompt, moderation_prompt, narrative_prompt, parse_metadata,
    strip_code_fences, FRAME_GRID_PROMPT, TRANSCRIBE_PROMPT,
};
use crate::provider::ContentAnalysisProvider;

const PROVIDER: &str = "Gemini";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini connection settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Per-request timeout; none by default
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Content analysis backed by Gemini.
pub struct GeminiProvider {
    http: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("GEMINI_API_KEY not set"));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    async fn generate(&self, parts: Vec<Part>, generation_config: GenerationConfig) -> ProviderResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let request = GeminiRequest {
            contents: vec![Content { parts }],
            generation_config,
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::request_failed(
                PROVIDER,
                format!("API returned {}: {}", status, error_text),
            ));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text: String = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "no content in response"))?;

        Ok(text.trim().to_string())
    }

    fn image_part(image_base64: &str) -> Part {
        Part::Inline {
            inline_data: InlineData {
                mime_type: "image/png",
                data: image_base64.to_string(),
            },
        }
    }
}

#[async_trait]
impl ContentAnalysisProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn describe(&self, grids: &[FrameGrid], transcript: &str) -> ProviderResult<String> {
        let mut descriptions = Vec::with_capacity(grids.len());
        for grid in grids {
            debug!(segment = grid.segment_index, "Describing frame grid");
            let text = self
                .generate(
                    vec![
                        Part::Text {
                            text: FRAME_GRID_PROMPT.to_string(),
                        },
                        Self::image_part(&grid.image_base64),
                    ],
                    GenerationConfig {
                        max_output_tokens: Some(400),
                        ..Default::default()
                    },
                )
                .await?;
            descriptions.push(text);
        }

        info!(grids = descriptions.len(), "Combining grid descriptions");

        let narrative = self
            .generate(
                vec![Part::Text {
                    text: narrative_prompt(&descriptions, transcript),
                }],
                GenerationConfig {
                    max_output_tokens: Some(1500),
                    ..Default::default()
                },
            )
            .await?;

        Ok(clean_narrative(&narrative))
    }

    async fn extract_metadata(
        &self,
        narrative: &str,
        duration_seconds: f64,
        provisional_safe: bool,
    ) -> ProviderResult<VideoMetadata> {
        let text = self
            .generate(
                vec![Part::Text {
                    text: metadata_prompt(narrative, duration_seconds, provisional_safe),
                }],
                GenerationConfig {
                    response_mime_type: Some("application/json"),
                    max_output_tokens: Some(1500),
                    temperature: Some(0.3),
                },
            )
            .await?;

        parse_metadata(PROVIDER, &text, duration_seconds)
    }

    async fn transcribe(&self, audio_wav: &[u8]) -> ProviderResult<String> {
        self.generate(
            vec![
                Part::Text {
                    text: TRANSCRIBE_PROMPT.to_string(),
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: "audio/wav",
                        data: STANDARD.encode(audio_wav),
                    },
                },
            ],
            GenerationConfig::default(),
        )
        .await
    }

    async fn moderate(&self, image_base64: &str) -> ProviderResult<ModerationScores> {
        let text = self
            .generate(
                vec![
                    Part::Text {
                        text: moderation_prompt(),
                    },
                    Self::image_part(image_base64),
                ],
                GenerationConfig {
                    response_mime_type: Some("application/json"),
                    temperature: Some(0.1),
                    ..Default::default()
                },
            )
            .await?;

        let value: serde_json::Value = serde_json::from_str(strip_code_fences(&text))?;
        let object = value
            .as_object()
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "moderation result is not an object"))?;

        Ok(ModerationScores::from_json_object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vdesc_models::ModerationCategory;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
    }

    fn provider(server: &MockServer) -> GeminiProvider {
        let mut config = GeminiConfig::new("test-key");
        config.base_url = server.uri();
        GeminiProvider::new(config).unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = GeminiProvider::new(GeminiConfig::new(" ")).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_inline_part_serialization() {
        let part = GeminiProvider::image_part("aGVsbG8=");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["inlineData"]["data"], "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_moderate_parses_scores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(reply("```json\n{\"violence\": 0.3, \"self_harm\": 0.0, \"flagged\": false}\n```"))
            .expect(1)
            .mount(&server)
            .await;

        let scores = provider(&server).moderate("aW1n").await.unwrap();
        assert_eq!(scores.score(ModerationCategory::Violence), Some(0.3));
        assert!(!scores.flagged);
    }

    #[tokio::test]
    async fn test_describe_combines_grids_and_cleans_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("**A preacher**\nat a pulpit"))
            .expect(3)
            .mount(&server)
            .await;

        let grids = vec![
            FrameGrid { segment_index: 0, image_base64: "YQ==".into(), tile_count: 16 },
            FrameGrid { segment_index: 1, image_base64: "Yg==".into(), tile_count: 16 },
        ];
        let narrative = provider(&server).describe(&grids, "").await.unwrap();
        assert_eq!(narrative, "A preacher   at a pulpit");
    }

    #[tokio::test]
    async fn test_error_status_is_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = provider(&server).transcribe(b"RIFF").await.unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed { .. }));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_extract_metadata_stamps_duration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(r#"{"keywords": [{"keyword": "choir", "weight": 7}], "is_safe": true}"#))
            .mount(&server)
            .await;

        let metadata = provider(&server)
            .extract_metadata("A choir sings.", 40.0, true)
            .await
            .unwrap();
        assert_eq!(metadata.keywords.len(), 1);
        assert_eq!(metadata.duration_estimate.as_deref(), Some("0:40"));
    }

    #[tokio::test]
    async fn test_network_error_does_not_leak_api_key() {
        let mut config = GeminiConfig::new("sekret-key-123");
        config.base_url = "http://127.0.0.1:1".to_string();
        let provider = GeminiProvider::new(config).unwrap();

        let err = provider.transcribe(b"RIFF").await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert!(!err.to_string().contains("sekret-key-123"));
        assert!(!format!("{err:?}").contains("sekret-key-123"));
    }
}
