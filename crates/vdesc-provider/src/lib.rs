//! Content analysis providers.
//!
//! This crate provides:
//! - The `ContentAnalysisProvider` capability used by the pipeline
//! - Gemini and OpenAI implementations
//! - Startup-time provider selection from the environment

pub mod config;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod provider;

pub use config::{build_provider, ContentBackend, ModerationSource, ProviderConfig};
pub use error::{ProviderError, ProviderResult};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai::{OmniModeration, OpenAiConfig, OpenAiProvider};
pub use provider::ContentAnalysisProvider;
