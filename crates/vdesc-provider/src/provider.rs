//! The content analysis capability consumed by the pipeline.

use async_trait::async_trait;
use vdesc_models::{FrameGrid, ModerationScores, VideoMetadata};

use crate::error::ProviderResult;

/// Description, metadata extraction, transcription and moderation scoring.
///
/// Implementations are selected once at startup and shared behind an `Arc`.
#[async_trait]
pub trait ContentAnalysisProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Narrative description of the video from its frame grids and transcript.
    async fn describe(&self, grids: &[FrameGrid], transcript: &str) -> ProviderResult<String>;

    /// Structured metadata derived from the narrative.
    async fn extract_metadata(
        &self,
        narrative: &str,
        duration_seconds: f64,
        provisional_safe: bool,
    ) -> ProviderResult<VideoMetadata>;

    /// Transcript of one WAV chunk.
    async fn transcribe(&self, audio_wav: &[u8]) -> ProviderResult<String>;

    /// Category scores for one base64 PNG image.
    async fn moderate(&self, image_base64: &str) -> ProviderResult<ModerationScores>;
}
