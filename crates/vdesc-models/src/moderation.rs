//! Moderation categories, scores and verdicts.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minimum confidence at which a category counts as detected.
pub const MODERATION_THRESHOLD: f64 = 0.25;

/// Harm category checked on every frame grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModerationCategory {
    Sexual,
    SexualMinors,
    Violence,
    ViolenceGraphic,
    Harassment,
    HarassmentThreatening,
    Hate,
    HateThreatening,
    SelfHarm,
    SelfHarmIntent,
    SelfHarmInstructions,
    Illicit,
    IllicitViolent,
}

impl ModerationCategory {
    /// Every category, in evaluation order.
    pub const ALL: [ModerationCategory; 13] = [
        ModerationCategory::Sexual,
        ModerationCategory::SexualMinors,
        ModerationCategory::Violence,
        ModerationCategory::ViolenceGraphic,
        ModerationCategory::Harassment,
        ModerationCategory::HarassmentThreatening,
        ModerationCategory::Hate,
        ModerationCategory::HateThreatening,
        ModerationCategory::SelfHarm,
        ModerationCategory::SelfHarmIntent,
        ModerationCategory::SelfHarmInstructions,
        ModerationCategory::Illicit,
        ModerationCategory::IllicitViolent,
    ];

    /// Normalised score key (lower snake case).
    pub fn key(&self) -> &'static str {
        match self {
            ModerationCategory::Sexual => "sexual",
            ModerationCategory::SexualMinors => "sexual_minors",
            ModerationCategory::Violence => "violence",
            ModerationCategory::ViolenceGraphic => "violence_graphic",
            ModerationCategory::Harassment => "harassment",
            ModerationCategory::HarassmentThreatening => "harassment_threatening",
            ModerationCategory::Hate => "hate",
            ModerationCategory::HateThreatening => "hate_threatening",
            ModerationCategory::SelfHarm => "self_harm",
            ModerationCategory::SelfHarmIntent => "self_harm_intent",
            ModerationCategory::SelfHarmInstructions => "self_harm_instructions",
            ModerationCategory::Illicit => "illicit",
            ModerationCategory::IllicitViolent => "illicit_violent",
        }
    }

    /// Human readable name used in warnings.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModerationCategory::Sexual => "Sexual",
            ModerationCategory::SexualMinors => "Sexual - Minors",
            ModerationCategory::Violence => "Violence",
            ModerationCategory::ViolenceGraphic => "Violence - Graphic",
            ModerationCategory::Harassment => "Harassment",
            ModerationCategory::HarassmentThreatening => "Harassment - Threatening",
            ModerationCategory::Hate => "Hate",
            ModerationCategory::HateThreatening => "Hate - Threatening",
            ModerationCategory::SelfHarm => "Self-Harm",
            ModerationCategory::SelfHarmIntent => "Self-Harm - Intent",
            ModerationCategory::SelfHarmInstructions => "Self-Harm - Instructions",
            ModerationCategory::Illicit => "Illicit",
            ModerationCategory::IllicitViolent => "Illicit - Violent",
        }
    }
}

/// Severity tier of a detected category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score > 0.70 {
            Severity::Critical
        } else if score > 0.40 {
            Severity::High
        } else if score > 0.20 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// Sort rank; lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    /// Rank of a warning by its first whitespace-separated token.
    ///
    /// Tokens that are not severity names (`SYSTEM`, `Error`, ...) rank 5.
    pub fn rank_of_warning(warning: &str) -> u8 {
        match warning.split_whitespace().next() {
            Some("CRITICAL") => Severity::Critical.rank(),
            Some("HIGH") => Severity::High.rank(),
            Some("MEDIUM") => Severity::Medium.rank(),
            Some("LOW") => Severity::Low.rank(),
            _ => 5,
        }
    }
}

/// Per-image confidence scores returned by a moderation provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModerationScores {
    /// Category key (normalised) to confidence in `0.0..=1.0`
    pub scores: HashMap<String, f64>,
    /// Provider-level flag
    #[serde(default)]
    pub flagged: bool,
}

impl ModerationScores {
    /// Normalise a provider key (`self-harm/intent`, `Self_Harm_Intent`) to `self_harm_intent`.
    pub fn normalize_key(key: &str) -> String {
        key.trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '/' || c == '-' || c == ' ' { '_' } else { c })
            .collect()
    }

    pub fn with_score(mut self, key: &str, score: f64) -> Self {
        self.scores.insert(Self::normalize_key(key), score);
        self
    }

    pub fn flagged(mut self, flagged: bool) -> Self {
        self.flagged = flagged;
        self
    }

    pub fn score(&self, category: ModerationCategory) -> Option<f64> {
        self.scores.get(category.key()).copied()
    }

    /// Build from a loosely-typed JSON object.
    ///
    /// Numeric members become scores, a boolean `flagged` member sets the
    /// flag, anything else is ignored.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut scores = HashMap::new();
        let mut flagged = false;

        for (key, value) in object {
            let key = Self::normalize_key(key);
            if key == "flagged" {
                flagged = value.as_bool().unwrap_or(false);
            } else if let Some(score) = value.as_f64() {
                scores.insert(key, score);
            }
        }

        Self { scores, flagged }
    }
}

/// Aggregated safety decision over all frame grids of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModerationVerdict {
    pub is_safe: bool,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_boundaries() {
        assert_eq!(Severity::from_score(0.71), Severity::Critical);
        assert_eq!(Severity::from_score(0.70), Severity::High);
        assert_eq!(Severity::from_score(0.40), Severity::Medium);
        assert_eq!(Severity::from_score(0.30), Severity::Medium);
        assert_eq!(Severity::from_score(0.20), Severity::Low);
    }

    #[test]
    fn test_rank_of_warning() {
        assert_eq!(Severity::rank_of_warning("CRITICAL RISK - Sexual detected"), 0);
        assert_eq!(Severity::rank_of_warning("LOW RISK - Hate detected"), 3);
        assert_eq!(
            Severity::rank_of_warning("SYSTEM FLAG - Content flagged by moderation system"),
            5
        );
        assert_eq!(Severity::rank_of_warning(""), 5);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(ModerationScores::normalize_key("self-harm/intent"), "self_harm_intent");
        assert_eq!(ModerationScores::normalize_key("Sexual/Minors"), "sexual_minors");
        assert_eq!(ModerationScores::normalize_key("violence"), "violence");
    }

    #[test]
    fn test_from_json_object_skips_non_numeric() {
        let value = serde_json::json!({
            "violence": 0.3,
            "hate": "high",
            "self-harm": 0.1,
            "flagged": true
        });
        let scores = ModerationScores::from_json_object(value.as_object().unwrap());

        assert!(scores.flagged);
        assert_eq!(scores.score(ModerationCategory::Violence), Some(0.3));
        assert_eq!(scores.score(ModerationCategory::SelfHarm), Some(0.1));
        assert_eq!(scores.score(ModerationCategory::Hate), None);
    }

    #[test]
    fn test_category_keys_are_unique() {
        let mut keys: Vec<_> = ModerationCategory::ALL.iter().map(|c| c.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 13);
    }
}
