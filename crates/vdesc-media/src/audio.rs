//! Audio track extraction and fixed-length chunk export.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_audio_duration_ms;

/// Length of one transcription chunk.
pub const AUDIO_CHUNK_MS: u64 = 90_000;

/// Largest chunk accepted for transcription (24 MiB).
pub const MAX_AUDIO_CHUNK_BYTES: u64 = 24 * 1024 * 1024;

/// Time span of one audio chunk, `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkSpan {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Contiguous chunk spans covering `duration_ms`.
///
/// Yields `ceil(duration_ms / chunk_ms)` spans; the last one is cut at the
/// end of the track.
pub fn plan_audio_chunks(duration_ms: u64, chunk_ms: u64) -> Vec<ChunkSpan> {
    let chunk_ms = chunk_ms.max(1);
    let count = duration_ms.div_ceil(chunk_ms);

    (0..count)
        .map(|i| {
            let start_ms = i * chunk_ms;
            ChunkSpan {
                index: i as usize,
                start_ms,
                end_ms: (start_ms + chunk_ms).min(duration_ms),
            }
        })
        .collect()
}

/// Full extracted audio track on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// Extracts WAV audio from video bytes and cuts it into chunks.
#[derive(Debug, Clone, Default)]
pub struct AudioExtractor {
    runner: FfmpegRunner,
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new().with_operation("audio"),
        }
    }

    /// Write the video's audio track to `dest` as PCM WAV.
    ///
    /// Returns `None` when the video has no audio stream; nothing is written
    /// in that case.
    pub async fn extract_track(&self, video: &[u8], dest: &Path) -> MediaResult<Option<AudioTrack>> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source");
        tokio::fs::write(&source, video).await?;

        let has_audio = match probe_audio_duration_ms(&source).await {
            Ok(duration) => duration.is_some(),
            Err(MediaError::FfprobeFailed { stderr, .. }) => {
                return Err(MediaError::decode(
                    stderr.unwrap_or_else(|| "container could not be opened".to_string()),
                ))
            }
            Err(e) => return Err(e),
        };

        if !has_audio {
            info!("Video has no audio stream");
            return Ok(None);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = FfmpegCommand::new(&source, dest)
            .no_video()
            .audio_codec("pcm_s16le");
        self.runner.run(&cmd).await?;

        let duration_ms = probe_audio_duration_ms(dest).await?.unwrap_or(0);
        info!(duration_ms, path = %dest.display(), "Audio track extracted");

        Ok(Some(AudioTrack {
            path: dest.to_path_buf(),
            duration_ms,
        }))
    }

    /// Export one span of the track to `dest` as PCM WAV.
    pub async fn export_chunk(&self, track: &AudioTrack, span: &ChunkSpan, dest: &Path) -> MediaResult<()> {
        debug!(index = span.index, start_ms = span.start_ms, end_ms = span.end_ms, "Exporting audio chunk");

        let cmd = FfmpegCommand::new(&track.path, dest)
            .seek(span.start_ms as f64 / 1000.0)
            .duration(span.duration_ms() as f64 / 1000.0)
            .audio_codec("pcm_s16le");

        self.runner.run(&cmd).await
    }
}
