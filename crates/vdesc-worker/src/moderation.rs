//! Safety verdict aggregated over all frame grids.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use futures::future::join_all;
use tracing::{error, info, warn};
use vdesc_models::{
    FrameGrid, ModerationCategory, ModerationScores, ModerationVerdict, Severity,
    MODERATION_THRESHOLD,
};
use vdesc_provider::{ContentAnalysisProvider, ProviderResult};

pub const SYSTEM_FLAG_WARNING: &str = "SYSTEM FLAG - Content flagged by moderation system";
pub const CRITICAL_SUMMARY: &str = "CRITICAL RISK - Severe content violations detected";
pub const HIGH_SUMMARY: &str = "HIGH RISK - Significant content concerns identified";
pub const TIMESTAMP_PREFIX: &str = "Content Moderation Timestamp:";

/// Warning line for one category score at or above the threshold.
pub fn category_warning(category: ModerationCategory, score: f64) -> String {
    format!(
        "{} RISK - {} detected (confidence: {:.1}%)",
        Severity::from_score(score).as_str(),
        category.display_name(),
        score * 100.0
    )
}

/// Warnings raised by one grid's scores, and whether the grid is safe.
fn grid_warnings(scores: &ModerationScores) -> (bool, Vec<String>) {
    let mut safe = true;
    let mut warnings = Vec::new();

    if scores.flagged {
        safe = false;
        warnings.push(SYSTEM_FLAG_WARNING.to_string());
    }

    for category in ModerationCategory::ALL {
        if let Some(score) = scores.score(category) {
            if score >= MODERATION_THRESHOLD {
                safe = false;
                warnings.push(category_warning(category, score));
            }
        }
    }

    (safe, warnings)
}

/// Dedupe, rank, summarize and stamp the collected warnings.
pub fn finalize_warnings(is_safe: bool, warnings: Vec<String>) -> Vec<String> {
    if is_safe {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut ordered: Vec<String> = warnings
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect();
    ordered.sort_by_key(|w| Severity::rank_of_warning(w));

    let mut summary = Vec::new();
    if ordered.iter().any(|w| w.contains("CRITICAL")) {
        summary.push(CRITICAL_SUMMARY.to_string());
    }
    if ordered.iter().any(|w| w.contains("HIGH")) {
        summary.push(HIGH_SUMMARY.to_string());
    }
    summary.extend(ordered);

    if !summary.is_empty() {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        summary.insert(0, format!("{TIMESTAMP_PREFIX} {timestamp}"));
    }
    summary
}

/// Runs moderation on every grid and folds the results into one verdict.
///
/// Fails closed: a grid whose evaluation errors makes the video unsafe.
#[derive(Clone)]
pub struct ModerationAggregator {
    provider: Arc<dyn ContentAnalysisProvider>,
}

impl ModerationAggregator {
    pub fn new(provider: Arc<dyn ContentAnalysisProvider>) -> Self {
        Self { provider }
    }

    pub async fn evaluate(&self, grids: &[FrameGrid]) -> ModerationVerdict {
        let results: Vec<ProviderResult<ModerationScores>> = join_all(
            grids
                .iter()
                .map(|grid| self.provider.moderate(&grid.image_base64)),
        )
        .await;

        let mut is_safe = true;
        let mut warnings = Vec::new();

        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(scores) => {
                    let (grid_safe, grid_warnings) = grid_warnings(&scores);
                    is_safe &= grid_safe;
                    warnings.extend(grid_warnings);
                }
                Err(e) => {
                    error!("Error processing image {}: {}", idx, e);
                    warnings.push(format!("Error processing image {idx}: {e}"));
                    is_safe = false;
                }
            }
        }

        let warnings = finalize_warnings(is_safe, warnings);

        info!(is_safe, warnings = warnings.len(), "Content moderation complete");
        for warning in warnings.iter().filter(|w| !w.starts_with(TIMESTAMP_PREFIX)) {
            warn!("Content warning: {}", warning);
        }

        ModerationVerdict { is_safe, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_warning_format() {
        assert_eq!(
            category_warning(ModerationCategory::SelfHarmIntent, 0.85),
            "CRITICAL RISK - Self-Harm - Intent detected (confidence: 85.0%)"
        );
        assert_eq!(
            category_warning(ModerationCategory::Violence, 0.3),
            "MEDIUM RISK - Violence detected (confidence: 30.0%)"
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let scores = ModerationScores::default().with_score("hate", 0.25);
        let (safe, warnings) = grid_warnings(&scores);
        assert!(!safe);
        assert_eq!(warnings, vec!["MEDIUM RISK - Hate detected (confidence: 25.0%)"]);

        let scores = ModerationScores::default().with_score("hate", 0.2499);
        assert!(grid_warnings(&scores).0);
    }

    #[test]
    fn test_flag_alone_is_unsafe() {
        let scores = ModerationScores::default().flagged(true);
        let (safe, warnings) = grid_warnings(&scores);
        assert!(!safe);
        assert_eq!(warnings, vec![SYSTEM_FLAG_WARNING]);
    }

    #[test]
    fn test_finalize_safe_clears_warnings() {
        assert!(finalize_warnings(true, vec!["LOW RISK - x".into()]).is_empty());
    }

    #[test]
    fn test_finalize_orders_and_summarizes() {
        let warnings = vec![
            SYSTEM_FLAG_WARNING.to_string(),
            "MEDIUM RISK - Violence detected (confidence: 30.0%)".to_string(),
            "CRITICAL RISK - Sexual detected (confidence: 90.0%)".to_string(),
            "MEDIUM RISK - Violence detected (confidence: 30.0%)".to_string(),
            "HIGH RISK - Hate detected (confidence: 50.0%)".to_string(),
        ];

        let out = finalize_warnings(false, warnings);
        assert!(out[0].starts_with(TIMESTAMP_PREFIX));
        assert_eq!(
            &out[1..],
            &[
                CRITICAL_SUMMARY.to_string(),
                HIGH_SUMMARY.to_string(),
                "CRITICAL RISK - Sexual detected (confidence: 90.0%)".to_string(),
                "HIGH RISK - Hate detected (confidence: 50.0%)".to_string(),
                "MEDIUM RISK - Violence detected (confidence: 30.0%)".to_string(),
                SYSTEM_FLAG_WARNING.to_string(),
            ]
        );
    }

    #[test]
    fn test_timestamp_format() {
        let out = finalize_warnings(false, vec![SYSTEM_FLAG_WARNING.to_string()]);
        let stamp = out[0].trim_start_matches(TIMESTAMP_PREFIX).trim();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
