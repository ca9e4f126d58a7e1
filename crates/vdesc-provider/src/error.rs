//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider configuration error: {0}")]
    Config(String),

    #[error("{provider} request failed: {message}")]
    RequestFailed {
        provider: &'static str,
        message: String,
    },

    #[error("Invalid {provider} response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Strips the request URL, which may carry credentials.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.without_url())
    }
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn request_failed(provider: &'static str, msg: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider,
            message: msg.into(),
        }
    }

    pub fn invalid_response(provider: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: msg.into(),
        }
    }
}
