//! Media operations behind one seam.
//!
//! The pipeline depends on [`MediaToolkit`] rather than on FFmpeg directly,
//! so alternative backends (and test doubles) can be injected.

use std::path::Path;

use async_trait::async_trait;
use vdesc_models::{FrameGrid, VideoSegment};

use crate::audio::{AudioExtractor, AudioTrack, ChunkSpan};
use crate::command::{check_ffmpeg, check_ffprobe};
use crate::error::MediaResult;
use crate::grid::FrameGridBuilder;
use crate::segment::{SplitVideo, VideoSegmenter};

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Split a video into temporal segments.
    async fn split_video(&self, video: &[u8]) -> MediaResult<SplitVideo>;

    /// Build the frame grid of one segment; `None` when no frame decodes.
    async fn frame_grid(&self, segment: &VideoSegment) -> MediaResult<Option<FrameGrid>>;

    /// Extract the full audio track to `dest`; `None` without an audio stream.
    async fn extract_audio(&self, video: &[u8], dest: &Path) -> MediaResult<Option<AudioTrack>>;

    /// Export one span of an extracted track to `dest`.
    async fn export_audio_chunk(&self, track: &AudioTrack, span: &ChunkSpan, dest: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed toolkit.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    segmenter: VideoSegmenter,
    grids: FrameGridBuilder,
    audio: AudioExtractor,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self {
            segmenter: VideoSegmenter::new(),
            grids: FrameGridBuilder::new(),
            audio: AudioExtractor::new(),
        }
    }

    /// Verify that the FFmpeg binaries are installed.
    pub fn check_binaries() -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn split_video(&self, video: &[u8]) -> MediaResult<SplitVideo> {
        self.segmenter.split(video).await
    }

    async fn frame_grid(&self, segment: &VideoSegment) -> MediaResult<Option<FrameGrid>> {
        self.grids.extract(segment).await
    }

    async fn extract_audio(&self, video: &[u8], dest: &Path) -> MediaResult<Option<AudioTrack>> {
        self.audio.extract_track(video, dest).await
    }

    async fn export_audio_chunk(&self, track: &AudioTrack, span: &ChunkSpan, dest: &Path) -> MediaResult<()> {
        self.audio.export_chunk(track, span, dest).await
    }
}
