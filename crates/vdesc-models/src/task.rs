//! Analysis task identity and lifecycle state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an analysis task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Pipeline is still working on the task
    #[default]
    Running,
    /// Pipeline finished and stored a result
    Completed,
    /// Pipeline aborted; an error result was stored
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    /// Terminal statuses accept no further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One labelled progress step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressStep {
    pub label: String,
    pub percent: u8,
}

/// Tracked state of one submitted video.
///
/// Steps are kept in recency order: recording a label that already exists
/// replaces its percent and moves it to the end.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub steps: Vec<ProgressStep>,
    /// Progress percentage (0-100)
    pub current_progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a running task with no progress.
    pub fn new(id: TaskId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Running,
            steps: Vec::new(),
            current_progress: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Clamp a raw percentage into `0..=100`.
    pub fn clamp_percent(percent: f64) -> u8 {
        if percent.is_nan() {
            return 0;
        }
        percent.clamp(0.0, 100.0) as u8
    }

    /// Insert or overwrite a step and make it the current one.
    pub fn record_step(&mut self, label: impl Into<String>, percent: u8) {
        let label = label.into();
        self.steps.retain(|s| s.label != label);
        self.steps.push(ProgressStep { label, percent });
        self.current_progress = percent;
        self.updated_at = Utc::now();
    }

    /// Label of the most recently recorded step.
    pub fn current_step(&self) -> Option<&str> {
        self.steps.last().map(|s| s.label.as_str())
    }

    /// Move to a terminal status.
    pub fn finish(&mut self, status: TaskStatus) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_running_with_zero_progress() {
        let task = Task::new(TaskId::new());
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.current_progress, 0);
        assert!(task.current_step().is_none());
        assert!(!task.is_terminal());
    }

    #[test]
    fn test_reused_label_moves_to_end() {
        let mut task = Task::new(TaskId::from_string("t1"));
        task.record_step("a", 10);
        task.record_step("b", 20);
        task.record_step("a", 30);

        let labels: Vec<_> = task.steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(task.current_step(), Some("a"));
        assert_eq!(task.current_progress, 30);
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(Task::clamp_percent(-5.0), 0);
        assert_eq!(Task::clamp_percent(150.0), 100);
        assert_eq!(Task::clamp_percent(42.9), 42);
        assert_eq!(Task::clamp_percent(f64::NAN), 0);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
