//! Provider metadata and the final analysis result.
//!
//! Providers return loosely structured JSON; decoding here is lenient so
//! that a list returned as a single string, or a boolean returned as text,
//! does not fail the whole task.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A keyword, weighted when the provider supplied a weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Keyword {
    Weighted {
        keyword: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[schemars(with = "Option<f64>")]
        weight: Option<serde_json::Number>,
    },
    Plain(String),
}

impl Keyword {
    pub fn text(&self) -> &str {
        match self {
            Keyword::Weighted { keyword, .. } => keyword,
            Keyword::Plain(keyword) => keyword,
        }
    }
}

/// Identity of the main person on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PersonIdentity {
    Known {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        gender: Option<String>,
    },
    Described(String),
}

/// Structured metadata extracted by a provider from the narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    #[serde(default, deserialize_with = "lenient_keywords")]
    pub keywords: Vec<Keyword>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub topics: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub entities: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub actions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub emotions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub visual_elements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub audio_elements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub target_audience: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration_estimate: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub quality_indicators: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub unique_identifiers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_face_exist: Option<bool>,
    #[serde(default)]
    pub person_identity: Option<PersonIdentity>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub other_person_identity: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub psychological_personality: Option<Vec<String>>,
    #[serde(default)]
    #[schemars(with = "Option<u64>")]
    pub no_of_person_in_video: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub content_warnings: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub safety_analysis: Option<Vec<String>>,
    /// The provider's own safety claim
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_safe: Option<bool>,
}

/// Coerce a provider person count.
///
/// Numeric strings become integers, any other string becomes 0.
pub fn coerce_person_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().unwrap_or(0)
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Successful analysis of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub description: String,
    pub is_safe: bool,
    pub content_warnings: Vec<String>,
    pub keywords: Vec<Keyword>,
    pub is_face_exist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_elements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_elements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_indicators: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_identifiers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_identity: Option<PersonIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_person_identity: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psychological_personality: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_person_in_video: Option<u64>,
}

impl AnalysisReport {
    /// Merge the narrative, the final safety decision and provider metadata.
    pub fn assemble(
        description: String,
        is_safe: bool,
        content_warnings: Vec<String>,
        metadata: VideoMetadata,
    ) -> Self {
        Self {
            description,
            is_safe,
            content_warnings,
            keywords: metadata.keywords,
            is_face_exist: metadata.is_face_exist.unwrap_or(false),
            topics: metadata.topics,
            entities: metadata.entities,
            actions: metadata.actions,
            emotions: metadata.emotions,
            visual_elements: metadata.visual_elements,
            audio_elements: metadata.audio_elements,
            genre: metadata.genre,
            target_audience: metadata.target_audience,
            quality_indicators: metadata.quality_indicators,
            unique_identifiers: metadata.unique_identifiers,
            person_identity: metadata.person_identity,
            other_person_identity: metadata.other_person_identity,
            psychological_personality: metadata.psychological_personality,
            no_of_person_in_video: metadata.no_of_person_in_video.as_ref().map(coerce_person_count),
        }
    }
}

/// Terminal outcome of a task, written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Completed(Box<AnalysisReport>),
    Error { message: String },
}

impl AnalysisResult {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisResult::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisResult::Error { .. })
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisResult::Completed(report) => Some(report),
            AnalysisResult::Error { .. } => None,
        }
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Null => None,
        Value::Array(items) => Some(items.into_iter().map(value_to_text).collect()),
        other => Some(vec![value_to_text(other)]),
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(value_to_text(other)),
    }))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }))
}

fn lenient_keywords<'de, D>(deserializer: D) -> Result<Vec<Keyword>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => s
            .split(',')
            .map(|k| Value::String(k.trim().to_string()))
            .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
            .collect(),
        _ => Vec::new(),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Keyword>(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_person_count_coercion() {
        assert_eq!(coerce_person_count(&json!("3")), 3);
        assert_eq!(coerce_person_count(&json!("three")), 0);
        assert_eq!(coerce_person_count(&json!("")), 0);
        assert_eq!(coerce_person_count(&json!(2)), 2);
        assert_eq!(coerce_person_count(&json!(null)), 0);
    }

    #[test]
    fn test_metadata_lenient_decoding() {
        let metadata: VideoMetadata = serde_json::from_value(json!({
            "keywords": [{"keyword": "church", "weight": 9}, "choir"],
            "topics": "worship",
            "genre": ["music", "live"],
            "is_face_exist": "true",
            "person_identity": {"name": "Unknown", "gender": "female"},
            "no_of_person_in_video": "4",
            "is_safe": false
        }))
        .unwrap();

        assert_eq!(metadata.keywords.len(), 2);
        assert_eq!(metadata.keywords[0].text(), "church");
        assert_eq!(metadata.keywords[1].text(), "choir");
        assert_eq!(metadata.topics, Some(vec!["worship".to_string()]));
        assert_eq!(metadata.genre.as_deref(), Some("music, live"));
        assert_eq!(metadata.is_face_exist, Some(true));
        assert_eq!(metadata.is_safe, Some(false));
    }

    #[test]
    fn test_assembled_report_wire_shape() {
        let metadata: VideoMetadata = serde_json::from_value(json!({
            "keywords": [{"keyword": "sermon", "weight": 8}],
            "no_of_person_in_video": "many",
            "genre": "religious"
        }))
        .unwrap();

        let result = AnalysisResult::Completed(Box::new(AnalysisReport::assemble(
            "A pastor speaks.".to_string(),
            true,
            Vec::new(),
            metadata,
        )));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "completed");
        assert_eq!(value["description"], "A pastor speaks.");
        assert_eq!(value["is_face_exist"], false);
        assert_eq!(value["no_of_person_in_video"], 0);
        assert_eq!(value["keywords"][0]["keyword"], "sermon");
        assert_eq!(value["genre"], "religious");
        assert!(value.get("topics").is_none());
    }

    #[test]
    fn test_error_result_wire_shape() {
        let value = serde_json::to_value(AnalysisResult::error("boom")).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "boom"}));
    }
}
