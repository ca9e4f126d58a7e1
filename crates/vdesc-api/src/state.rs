//! Application state.

use vdesc_worker::PipelineOrchestrator;

use crate::config::ApiConfig;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: PipelineOrchestrator,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: PipelineOrchestrator) -> Self {
        Self { config, pipeline }
    }
}
