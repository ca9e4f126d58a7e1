//! Frame grid composition.
//!
//! Up to sixteen evenly spaced frames of a segment are tiled into one
//! 4x4 PNG so a single image summarises the segment.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use tracing::{debug, warn};
use vdesc_models::{FrameGrid, VideoSegment};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Frames sampled per segment.
pub const GRID_TILES: usize = 16;

/// Columns (and rows) of the grid canvas.
pub const GRID_COLUMNS: u32 = 4;

/// Frame indices to sample from a segment of `total_frames` frames.
///
/// Positions are `i * max(1, total_frames / 16)` clamped to the last frame;
/// duplicates from short segments are removed so no frame is tiled twice.
pub fn sample_positions(total_frames: u64) -> Vec<u64> {
    if total_frames == 0 {
        return Vec::new();
    }

    let interval = (total_frames / GRID_TILES as u64).max(1);
    let mut positions: Vec<u64> = (0..GRID_TILES as u64)
        .map(|i| (i * interval).min(total_frames - 1))
        .collect();
    positions.dedup();
    positions
}

/// Tile frames row-major onto a fixed 4x4 canvas.
///
/// The tile size is taken from the first frame. Returns `None` for an empty
/// slice; frames beyond sixteen are ignored.
pub fn compose_grid(frames: &[RgbImage]) -> Option<RgbImage> {
    let first = frames.first()?;
    let (tile_w, tile_h) = first.dimensions();
    let mut canvas = RgbImage::new(tile_w * GRID_COLUMNS, tile_h * GRID_COLUMNS);

    for (i, frame) in frames.iter().take(GRID_TILES).enumerate() {
        let i = i as u32;
        let x = (i % GRID_COLUMNS) * tile_w;
        let y = (i / GRID_COLUMNS) * tile_h;
        image::imageops::replace(&mut canvas, frame, i64::from(x), i64::from(y));
    }

    Some(canvas)
}

/// Encode an image as base64 PNG.
pub fn encode_png_base64(image: RgbImage) -> MediaResult<String> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

/// Builds one frame grid per segment.
#[derive(Debug, Clone, Default)]
pub struct FrameGridBuilder {
    runner: FfmpegRunner,
}

impl FrameGridBuilder {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new().with_operation("frame_grid"),
        }
    }

    /// Build the grid for one segment.
    ///
    /// Frames that fail to decode are dropped. A segment yielding no frames,
    /// including one whose container cannot be read, produces `None`.
    pub async fn extract(&self, segment: &VideoSegment) -> MediaResult<Option<FrameGrid>> {
        if segment.data.is_empty() {
            return Ok(None);
        }

        let dir = tempfile::tempdir()?;
        let source = dir.path().join(format!("segment_{}.mp4", segment.index));
        tokio::fs::write(&source, &segment.data).await?;

        let info = match probe_video(&source).await {
            Ok(info) => info,
            Err(e) => {
                warn!(segment = segment.index, "Segment could not be probed: {}", e);
                return Ok(None);
            }
        };

        let mut frames = Vec::new();
        for (i, position) in sample_positions(info.total_frames).into_iter().enumerate() {
            let output = dir.path().join(format!("frame_{i:02}.png"));
            match self.read_frame(&source, &output, position).await {
                Ok(frame) => frames.push(frame),
                Err(e) => debug!(segment = segment.index, position, "Dropping frame: {}", e),
            }
        }

        let tile_count = frames.len();
        let Some(grid) = compose_grid(&frames) else {
            warn!(segment = segment.index, "No frames decoded from segment");
            return Ok(None);
        };

        Ok(Some(FrameGrid {
            segment_index: segment.index,
            image_base64: encode_png_base64(grid)?,
            tile_count,
        }))
    }

    async fn read_frame(&self, source: &Path, output: &Path, position: u64) -> MediaResult<RgbImage> {
        let cmd = FfmpegCommand::new(source, output)
            .video_filter(format!("select=eq(n\\,{position})"))
            .passthrough_timing()
            .single_frame();

        self.runner.run(&cmd).await?;

        let bytes = tokio::fs::read(output).await?;
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }
}
