//! Temporal video segmentation.
//!
//! A video is cut into at most [`MAX_SEGMENTS`] parts, one per full minute
//! of duration. Each part is re-encoded on its own so it can be probed and
//! sampled independently.

use std::ops::Range;
use std::path::Path;

use tracing::{debug, info};
use vdesc_models::VideoSegment;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_video, VideoInfo};

/// Upper bound on segments per video.
pub const MAX_SEGMENTS: usize = 5;

/// Seconds of video per segment before another segment is added.
pub const SECONDS_PER_SEGMENT: f64 = 60.0;

/// Codec used for re-encoded segments.
pub const SEGMENT_CODEC: &str = "mpeg4";

/// Result of splitting one video.
#[derive(Debug, Clone)]
pub struct SplitVideo {
    pub segments: Vec<VideoSegment>,
    /// `total_frames / fps`, or 0 when the rate is unknown
    pub duration_seconds: f64,
}

/// Number of segments for a video.
///
/// One per full minute, clamped to `1..=MAX_SEGMENTS`, and never more than
/// the number of frames.
pub fn segment_count(total_frames: u64, duration_seconds: f64) -> usize {
    let by_duration = if duration_seconds.is_finite() && duration_seconds > 0.0 {
        (duration_seconds / SECONDS_PER_SEGMENT).floor() as usize
    } else {
        0
    };
    let parts = by_duration.clamp(1, MAX_SEGMENTS);
    let frame_cap = usize::try_from(total_frames.max(1)).unwrap_or(usize::MAX);
    parts.min(frame_cap)
}

/// Partition `[0, total_frames)` into contiguous frame ranges.
///
/// Every range but the last holds `total_frames / parts` frames; the last
/// absorbs the remainder.
pub fn plan_segments(total_frames: u64, duration_seconds: f64) -> Vec<Range<u64>> {
    let parts = segment_count(total_frames, duration_seconds) as u64;
    let per_part = total_frames / parts;

    (0..parts)
        .map(|i| {
            let start = i * per_part;
            let end = if i == parts - 1 {
                total_frames
            } else {
                start + per_part
            };
            start..end
        })
        .collect()
}

/// Splits raw video bytes into re-encoded segments.
#[derive(Debug, Clone, Default)]
pub struct VideoSegmenter {
    runner: FfmpegRunner,
}

impl VideoSegmenter {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new().with_operation("segment"),
        }
    }

    /// Split a video.
    ///
    /// Fails with a decode error when the container cannot be probed; no
    /// partial segment list is returned.
    pub async fn split(&self, video: &[u8]) -> MediaResult<SplitVideo> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source");
        tokio::fs::write(&source, video).await?;

        let info = probe_video(&source).await?;
        let duration_seconds = info.duration_seconds();
        let ranges = plan_segments(info.total_frames, duration_seconds);

        info!(
            total_frames = info.total_frames,
            fps = info.fps,
            duration_seconds,
            parts = ranges.len(),
            "Splitting video"
        );

        let mut segments = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.into_iter().enumerate() {
            let data = if range.is_empty() {
                Vec::new()
            } else {
                let output = dir.path().join(format!("part_{index}.mp4"));
                self.encode_range(&source, &output, &range, &info).await?;
                tokio::fs::read(&output).await?
            };

            debug!(index, start = range.start, end = range.end, bytes = data.len(), "Segment encoded");

            segments.push(VideoSegment {
                index,
                data,
                start_frame: range.start,
                end_frame: range.end,
            });
        }

        Ok(SplitVideo {
            segments,
            duration_seconds,
        })
    }

    async fn encode_range(
        &self,
        source: &Path,
        output: &Path,
        range: &Range<u64>,
        info: &VideoInfo,
    ) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(source, output)
            .video_filter(segment_filter(range))
            .no_audio()
            .video_codec(SEGMENT_CODEC)
            .output_arg("-q:v")
            .output_arg("3");

        if info.fps > 0.0 {
            cmd = cmd.frame_rate(info.fps);
        }

        self.runner.run(&cmd).await
    }
}

/// Filter selecting the frames of `range` and re-basing their timestamps.
fn segment_filter(range: &Range<u64>) -> String {
    format!(
        "select=between(n\\,{}\\,{}),setpts=N/FRAME_RATE/TB",
        range.start,
        range.end.saturating_sub(1)
    )
}
