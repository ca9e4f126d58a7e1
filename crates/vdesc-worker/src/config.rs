//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vdesc_media::{AUDIO_CHUNK_MS, MAX_AUDIO_CHUNK_BYTES};

/// Remote video download settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_attempts: std::env::var("FETCH_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay: Duration::from_secs(
                std::env::var("FETCH_RETRY_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for extracted audio artifacts
    pub scratch_dir: PathBuf,
    /// Length of one transcription chunk in milliseconds
    pub audio_chunk_ms: u64,
    /// Largest chunk accepted for transcription
    pub audio_chunk_max_bytes: u64,
    /// How long finished tasks and results stay pollable
    pub task_ttl: Duration,
    /// Upper bound on tracked tasks (and on stored results)
    pub max_tracked_tasks: usize,
    pub fetch: FetchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("vdesc"),
            audio_chunk_ms: AUDIO_CHUNK_MS,
            audio_chunk_max_bytes: MAX_AUDIO_CHUNK_BYTES,
            task_ttl: Duration::from_secs(3600), // 1 hour
            max_tracked_tasks: 10_000,
            fetch: FetchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            scratch_dir: std::env::var("VDESC_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("vdesc")),
            audio_chunk_ms: std::env::var("AUDIO_CHUNK_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(AUDIO_CHUNK_MS),
            audio_chunk_max_bytes: std::env::var("AUDIO_CHUNK_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_AUDIO_CHUNK_BYTES),
            task_ttl: Duration::from_secs(
                std::env::var("TASK_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            max_tracked_tasks: std::env::var("MAX_TRACKED_TASKS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            fetch: FetchConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.audio_chunk_ms, 90_000);
        assert_eq!(config.audio_chunk_max_bytes, 24 * 1024 * 1024);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.retry_delay, Duration::from_secs(10));
    }
}
