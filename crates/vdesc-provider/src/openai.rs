//! OpenAI chat, transcription and moderation provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use vdesc_models::{FrameGrid, ModerationScores, VideoMetadata};

use crate::error::{ProviderError, ProviderResult};
use crate::prompts::{metadata_prompt, narrative_prompt, parse_metadata, FRAME_GRID_PROMPT};
use crate::provider::ContentAnalysisProvider;

const PROVIDER: &str = "OpenAI";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI connection settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used on frame grid images
    pub vision_model: String,
    /// Model used for narrative and metadata
    pub text_model: String,
    pub transcribe_model: String,
    pub moderation_model: String,
    /// Per-request timeout; none by default
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            vision_model: "gpt-4o".to_string(),
            text_model: "gpt-4o".to_string(),
            transcribe_model: "whisper-1".to_string(),
            moderation_model: "omni-moderation-latest".to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    flagged: bool,
    #[serde(default)]
    category_scores: serde_json::Map<String, Value>,
}

fn png_data_url(image_base64: &str) -> String {
    format!("data:image/png;base64,{image_base64}")
}

/// Content analysis backed by the OpenAI REST API.
pub struct OpenAiProvider {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("OPENAI_API_KEY not set"));
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

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let response = request.bearer_auth(&self.config.api_key).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::request_failed(
                PROVIDER,
                format!("API returned {}: {}", status, error_text),
            ));
        }

        Ok(response.json().await?)
    }

    async fn chat(
        &self,
        model: &str,
        content: Value,
        max_tokens: u32,
        json_output: bool,
    ) -> ProviderResult<String> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens,
            response_format: json_output.then(|| json!({"type": "json_object"})),
        };

        let response: ChatResponse = self
            .send(self.http.post(self.endpoint("chat/completions")).json(&request))
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "no content in response"))
    }
}

#[async_trait]
impl ContentAnalysisProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn describe(&self, grids: &[FrameGrid], transcript: &str) -> ProviderResult<String> {
        let mut descriptions = Vec::with_capacity(grids.len());
        for grid in grids {
            debug!(segment = grid.segment_index, "Describing frame grid");
            let content = json!([
                {"type": "text", "text": FRAME_GRID_PROMPT},
                {"type": "image_url", "image_url": {"url": png_data_url(&grid.image_base64)}}
            ]);
            descriptions.push(self.chat(&self.config.vision_model, content, 500, false).await?);
        }

        let prompt = narrative_prompt(&descriptions, transcript);
        self.chat(&self.config.text_model, Value::String(prompt), 1500, false)
            .await
    }

    async fn extract_metadata(
        &self,
        narrative: &str,
        duration_seconds: f64,
        provisional_safe: bool,
    ) -> ProviderResult<VideoMetadata> {
        let prompt = metadata_prompt(narrative, duration_seconds, provisional_safe);
        let text = self
            .chat(&self.config.text_model, Value::String(prompt), 1500, true)
            .await?;

        parse_metadata(PROVIDER, &text, duration_seconds)
    }

    async fn transcribe(&self, audio_wav: &[u8]) -> ProviderResult<String> {
        let file = Part::bytes(audio_wav.to_vec())
            .file_name("chunk.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.config.transcribe_model.clone())
            .part("file", file);

        let response: TranscriptionResponse = self
            .send(self.http.post(self.endpoint("audio/transcriptions")).multipart(form))
            .await?;

        Ok(response.text.trim().to_string())
    }

    async fn moderate(&self, image_base64: &str) -> ProviderResult<ModerationScores> {
        let body = json!({
            "model": self.config.moderation_model,
            "input": [{"type": "image_url", "image_url": {"url": png_data_url(image_base64)}}]
        });

        let response: ModerationResponse = self
            .send(self.http.post(self.endpoint("moderations")).json(&body))
            .await?;

        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "no moderation results"))?;

        let mut scores = ModerationScores::from_json_object(&result.category_scores);
        scores.flagged = result.flagged;
        Ok(scores)
    }
}

/// Any provider with moderation delegated to OpenAI's moderation endpoint.
pub struct OmniModeration {
    inner: Box<dyn ContentAnalysisProvider>,
    moderator: OpenAiProvider,
}

impl OmniModeration {
    pub fn new(inner: Box<dyn ContentAnalysisProvider>, moderator: OpenAiProvider) -> Self {
        Self { inner, moderator }
    }
}

#[async_trait]
impl ContentAnalysisProvider for OmniModeration {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn describe(&self, grids: &[FrameGrid], transcript: &str) -> ProviderResult<String> {
        self.inner.describe(grids, transcript).await
    }

    async fn extract_metadata(
        &self,
        narrative: &str,
        duration_seconds: f64,
        provisional_safe: bool,
    ) -> ProviderResult<VideoMetadata> {
        self.inner
            .extract_metadata(narrative, duration_seconds, provisional_safe)
            .await
    }

    async fn transcribe(&self, audio_wav: &[u8]) -> ProviderResult<String> {
        self.inner.transcribe(audio_wav).await
    }

    async fn moderate(&self, image_base64: &str) -> ProviderResult<ModerationScores> {
        self.moderator.moderate(image_base64).await
    }
}
