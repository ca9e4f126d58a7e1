//! Audio extraction and chunked transcription.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vdesc_media::{plan_audio_chunks, AudioTrack, MediaError, MediaToolkit};
use vdesc_models::AudioChunk;
use vdesc_provider::ContentAnalysisProvider;

use crate::error::WorkerResult;
use crate::tracker::TaskProgress;

/// Transcript of a whole video plus the chunks it was built from.
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    pub transcript: String,
    pub chunks: Vec<AudioChunk>,
    /// Extracted full track; `None` for videos without audio
    pub track: Option<AudioTrack>,
}

/// Join per-chunk transcripts with single spaces in index order.
pub fn join_transcripts(chunks: &[AudioChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.transcript.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the audio track once and transcribes it in fixed-length chunks.
#[derive(Clone)]
pub struct AudioChunker {
    media: Arc<dyn MediaToolkit>,
    provider: Arc<dyn ContentAnalysisProvider>,
    chunk_ms: u64,
    max_chunk_bytes: u64,
}

impl AudioChunker {
    pub fn new(
        media: Arc<dyn MediaToolkit>,
        provider: Arc<dyn ContentAnalysisProvider>,
        chunk_ms: u64,
        max_chunk_bytes: u64,
    ) -> Self {
        Self {
            media,
            provider,
            chunk_ms,
            max_chunk_bytes,
        }
    }

    /// Transcribe the video's audio.
    ///
    /// The full track is written to `artifact`, which the caller owns and
    /// deletes. Chunk files live in a temporary directory removed on return.
    pub async fn extract(
        &self,
        video: &[u8],
        artifact: &Path,
        progress: Option<&TaskProgress>,
    ) -> WorkerResult<Transcription> {
        if let Some(p) = progress {
            p.step("Extracting audio", 10.0).await;
        }

        let Some(track) = self.media.extract_audio(video, artifact).await? else {
            if let Some(p) = progress {
                p.step("No audio stream found", 40.0).await;
            }
            return Ok(Transcription::default());
        };

        if let Some(p) = progress {
            p.step("Audio extracted and saved", 25.0).await;
        }

        let spans = plan_audio_chunks(track.duration_ms, self.chunk_ms);
        let total = spans.len();
        info!(
            chunks = total,
            chunk_secs = self.chunk_ms as f64 / 1000.0,
            "Splitting audio into chunks"
        );

        if let Some(p) = progress {
            p.step("Starting audio transcription", 30.0).await;
        }

        let scratch = tempfile::tempdir()?;
        let mut chunks = Vec::with_capacity(total);

        for span in &spans {
            let chunk_path = scratch.path().join(format!("chunk_{}.wav", span.index));
            self.media
                .export_audio_chunk(&track, span, &chunk_path)
                .await?;

            let size_bytes = match tokio::fs::metadata(&chunk_path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            };

            if size_bytes > self.max_chunk_bytes {
                return Err(MediaError::SizeLimit {
                    index: span.index,
                    size: size_bytes,
                    limit: self.max_chunk_bytes,
                }
                .into());
            }

            let transcript = if size_bytes == 0 {
                warn!(index = span.index, "Chunk {}/{} is empty, skipping transcription", span.index + 1, total);
                String::new()
            } else {
                let audio = tokio::fs::read(&chunk_path).await?;
                self.provider.transcribe(&audio).await?
            };

            chunks.push(AudioChunk {
                index: span.index,
                start_ms: span.start_ms,
                end_ms: span.end_ms,
                size_bytes,
                transcript,
            });

            if let Some(p) = progress {
                let percent = 30.0 + (span.index + 1) as f64 * 5.0 / total as f64;
                p.step(&format!("Transcribed chunk {}/{}", span.index + 1, total), percent)
                    .await;
            }
        }

        let transcript = join_transcripts(&chunks);

        if let Some(p) = progress {
            p.step("Audio transcription completed", 35.0).await;
            p.step("Audio processing completed", 40.0).await;
        }

        Ok(Transcription {
            transcript,
            chunks,
            track: Some(track),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, transcript: &str) -> AudioChunk {
        AudioChunk {
            index,
            start_ms: index as u64 * 90_000,
            end_ms: (index as u64 + 1) * 90_000,
            size_bytes: 1,
            transcript: transcript.to_string(),
        }
    }

    #[test]
    fn test_join_in_index_order() {
        let chunks = vec![chunk(0, "in the beginning"), chunk(1, "was the word")];
        assert_eq!(join_transcripts(&chunks), "in the beginning was the word");
    }

    #[test]
    fn test_join_keeps_empty_segments() {
        let chunks = vec![chunk(0, "a"), chunk(1, ""), chunk(2, "b")];
        assert_eq!(join_transcripts(&chunks), "a  b");
        assert_eq!(join_transcripts(&[]), "");
    }
}
