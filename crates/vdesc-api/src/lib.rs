//! Axum HTTP API for the vdesc video analysis service.
//!
//! Routes:
//! - `POST /api/v1/analyze_video`: multipart submission (upload or URL)
//! - `GET /api/v1/analysis_result/:task_id`: result or progress
//! - `GET /health`, `/healthz`, `/ready`, `/metrics`

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
