//! Video analysis pipeline.
//!
//! This crate provides:
//! - Task progress tracking and a write-once result store, both TTL-bounded
//! - Remote video download with fixed-delay retries
//! - Chunked audio transcription
//! - Moderation verdict aggregation over frame grids
//! - The orchestrator tying the stages into one task lifecycle

pub mod audio;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod moderation;
pub mod pipeline;
pub mod results;
pub mod retry;
pub mod store;
pub mod tracker;

pub use audio::{join_transcripts, AudioChunker, Transcription};
pub use config::{FetchConfig, PipelineConfig};
pub use error::{WorkerError, WorkerResult};
pub use fetch::{FetchedVideo, RetryingFetcher};
pub use logging::TaskLogger;
pub use moderation::ModerationAggregator;
pub use pipeline::{PipelineOrchestrator, VideoAnalysis, VideoSource};
pub use results::ResultStore;
pub use retry::{retry_async, RetryPolicy, RetryResult};
pub use tracker::{TaskProgress, TaskTracker};
