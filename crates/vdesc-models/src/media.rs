//! Intermediate media artifacts produced by the pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One temporal slice of the source video.
///
/// Covers the half-open frame range `[start_frame, end_frame)`.
#[derive(Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    pub index: usize,
    /// Re-encoded segment container bytes
    #[serde(skip)]
    pub data: Vec<u8>,
    pub start_frame: u64,
    pub end_frame: u64,
}

impl VideoSegment {
    pub fn frame_count(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }
}

impl std::fmt::Debug for VideoSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSegment")
            .field("index", &self.index)
            .field("bytes", &self.data.len())
            .field("start_frame", &self.start_frame)
            .field("end_frame", &self.end_frame)
            .finish()
    }
}

/// Composite image tiling sampled frames of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameGrid {
    /// Index of the segment the frames came from
    pub segment_index: usize,
    /// Base64 (standard alphabet) PNG
    pub image_base64: String,
    /// Number of frames actually tiled (at most 16)
    pub tile_count: usize,
}

/// One fixed-duration slice of the extracted audio track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AudioChunk {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub size_bytes: u64,
    pub transcript: String,
}
