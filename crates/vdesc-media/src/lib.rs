//! FFmpeg CLI wrapper for video analysis.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - FFprobe-based stream inspection
//! - Temporal segmentation of a video into at most five parts
//! - Frame grid sampling and PNG composition
//! - Audio track extraction and fixed-length chunk export
//! - The [`MediaToolkit`] seam used by the analysis pipeline

pub mod audio;
pub mod command;
pub mod error;
pub mod grid;
pub mod probe;
pub mod segment;
pub mod toolkit;

pub use audio::{plan_audio_chunks, AudioExtractor, AudioTrack, ChunkSpan, AUDIO_CHUNK_MS, MAX_AUDIO_CHUNK_BYTES};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use grid::{compose_grid, encode_png_base64, sample_positions, FrameGridBuilder, GRID_TILES};
pub use probe::{probe_audio_duration_ms, probe_video, VideoInfo};
pub use segment::{plan_segments, segment_count, SplitVideo, VideoSegmenter, MAX_SEGMENTS};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
