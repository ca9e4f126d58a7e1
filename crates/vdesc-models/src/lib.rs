//! Shared data models for the vdesc video analysis service.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis tasks and their progress steps
//! - Intermediate media artifacts (segments, frame grids, audio chunks)
//! - Moderation scores and verdicts
//! - Provider metadata and final analysis results
//! - Poll responses

pub mod analysis;
pub mod media;
pub mod moderation;
pub mod poll;
pub mod task;

// Re-export common types
pub use analysis::{
    coerce_person_count, AnalysisReport, AnalysisResult, Keyword, PersonIdentity, VideoMetadata,
};
pub use media::{AudioChunk, FrameGrid, VideoSegment};
pub use moderation::{
    ModerationCategory, ModerationScores, ModerationVerdict, Severity, MODERATION_THRESHOLD,
};
pub use poll::PollResponse;
pub use task::{ProgressStep, Task, TaskId, TaskStatus};
