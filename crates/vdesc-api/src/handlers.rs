//! API handlers.

pub mod analysis;
pub mod health;

pub use analysis::{analysis_result, analyze_video};
pub use health::{health, ready};
