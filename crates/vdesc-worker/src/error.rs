//! Pipeline error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to download video: {message}")]
    Fetch { attempts: u32, message: String },

    #[error("No valid frames could be extracted from the video")]
    NoUsableFrames,

    #[error(transparent)]
    Media(#[from] vdesc_media::MediaError),

    #[error(transparent)]
    Provider(#[from] vdesc_provider::ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline branch failed: {0}")]
    Join(String),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn fetch(attempts: u32, msg: impl Into<String>) -> Self {
        Self::Fetch {
            attempts,
            message: msg.into(),
        }
    }

    /// Errors raised before a task exists, caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, WorkerError::Validation(_))
    }

    /// Short category label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::Fetch { .. } => "fetch",
            WorkerError::NoUsableFrames => "no_frames",
            WorkerError::Media(e) if e.is_decode() => "decode",
            WorkerError::Media(vdesc_media::MediaError::SizeLimit { .. }) => "size_limit",
            WorkerError::Media(_) => "media",
            WorkerError::Provider(_) => "provider",
            WorkerError::Io(_) => "io",
            WorkerError::Join(_) => "join",
        }
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            WorkerError::NoUsableFrames.to_string(),
            "No valid frames could be extracted from the video"
        );
        assert_eq!(
            WorkerError::fetch(3, "connection refused").to_string(),
            "Failed to download video: connection refused"
        );
        assert!(WorkerError::validation("x").is_client_error());
    }

    #[test]
    fn test_kind_for_media_errors() {
        let decode = WorkerError::from(vdesc_media::MediaError::decode("bad container"));
        assert_eq!(decode.kind(), "decode");
    }
}
