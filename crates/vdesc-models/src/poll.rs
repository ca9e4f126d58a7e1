//! Poll response returned to clients.

use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;

use crate::analysis::AnalysisResult;

/// Outcome of polling a task id.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// The stored result, returned verbatim.
    Finished(AnalysisResult),
    /// Task is known but has no stored result yet.
    Pending {
        progress: u8,
        current_step: Option<String>,
    },
    /// Task id was never issued or has been evicted.
    Unknown,
}

impl PollResponse {
    pub fn is_unknown(&self) -> bool {
        matches!(self, PollResponse::Unknown)
    }
}

impl Serialize for PollResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PollResponse::Finished(result) => result.serialize(serializer),
            PollResponse::Pending {
                progress,
                current_step,
            } => {
                let mut state = serializer.serialize_struct("PollResponse", 3)?;
                state.serialize_field("status", "pending")?;
                state.serialize_field("progress", progress)?;
                state.serialize_field("current_step", current_step)?;
                state.end()
            }
            PollResponse::Unknown => {
                let mut state = serializer.serialize_struct("PollResponse", 2)?;
                state.serialize_field("status", "unknown")?;
                state.serialize_field("progress", &0u8)?;
                state.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_serializes_null_step() {
        let value = serde_json::to_value(PollResponse::Pending {
            progress: 0,
            current_step: None,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"status": "pending", "progress": 0, "current_step": null})
        );
    }

    #[test]
    fn test_unknown_shape() {
        let value = serde_json::to_value(PollResponse::Unknown).unwrap();
        assert_eq!(value, json!({"status": "unknown", "progress": 0}));
    }

    #[test]
    fn test_finished_is_verbatim() {
        let value = serde_json::to_value(PollResponse::Finished(AnalysisResult::error("x"))).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "x"}));
    }
}
