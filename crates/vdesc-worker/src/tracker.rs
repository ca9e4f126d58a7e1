//! Task progress tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use vdesc_models::{Task, TaskId, TaskStatus};

use crate::store::{Expiring, TtlTable};

impl Expiring for Task {
    fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}

/// Process-wide table of task progress records.
///
/// Each task is mutated only by the pipeline run that owns it; any number of
/// pollers may read concurrently. Terminal tasks ignore further updates.
#[derive(Clone)]
pub struct TaskTracker {
    tasks: Arc<TtlTable<Task>>,
}

impl TaskTracker {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            tasks: Arc::new(TtlTable::new(ttl, capacity)),
        }
    }

    /// Register a new running task with zero progress.
    pub async fn start(&self, id: &TaskId) -> Task {
        let task = Task::new(id.clone());
        self.tasks.insert(id.clone(), task.clone()).await;
        debug!(task_id = %id, "Task registered");
        task
    }

    /// Record a step and set progress to its percent.
    pub async fn update_progress(&self, id: &TaskId, label: &str, percent: f64) {
        let percent = Task::clamp_percent(percent);
        self.tasks
            .update(id, |task| {
                if !task.is_terminal() {
                    task.record_step(label, percent);
                }
            })
            .await;
    }

    /// Like [`update_progress`](Self::update_progress) but never lowers the
    /// current progress.
    pub async fn advance(&self, id: &TaskId, label: &str, percent: f64) {
        let percent = Task::clamp_percent(percent);
        self.tasks
            .update(id, |task| {
                if !task.is_terminal() {
                    let current = task.current_progress.max(percent);
                    task.record_step(label, percent);
                    task.current_progress = current;
                }
            })
            .await;
    }

    /// Move a task to a terminal status without touching its progress.
    pub async fn complete(&self, id: &TaskId, status: TaskStatus) {
        self.finish(id, status, None).await;
    }

    /// Terminal transition plus an optional final step, applied atomically.
    pub async fn finish(&self, id: &TaskId, status: TaskStatus, final_step: Option<(&str, u8)>) {
        self.tasks
            .update(id, |task| {
                if task.is_terminal() {
                    return;
                }
                if let Some((label, percent)) = final_step {
                    task.record_step(label, percent.min(100));
                }
                task.finish(status);
            })
            .await;
    }

    /// Snapshot of a task, if known.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).await
    }

    pub async fn purge_expired(&self) -> usize {
        self.tasks.purge_expired().await
    }

    pub async fn len(&self) -> usize {
        self.tasks.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.is_empty().await
    }
}

/// Progress handle for one task, passed down into pipeline stages.
#[derive(Clone)]
pub struct TaskProgress {
    tracker: TaskTracker,
    id: TaskId,
}

impl TaskProgress {
    pub fn new(tracker: TaskTracker, id: TaskId) -> Self {
        Self { tracker, id }
    }

    /// Record a step without lowering the task's progress.
    pub async fn step(&self, label: &str, percent: f64) {
        self.tracker.advance(&self.id, label, percent).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TaskTracker {
        TaskTracker::new(Duration::from_secs(3600), 100)
    }

    #[tokio::test]
    async fn test_start_and_update() {
        let tracker = tracker();
        let id = TaskId::new();
        tracker.start(&id).await;

        tracker.update_progress(&id, "Splitting video", 150.0).await;
        let task = tracker.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.current_progress, 100);
        assert_eq!(task.current_step(), Some("Splitting video"));
    }

    #[tokio::test]
    async fn test_advance_never_lowers_progress() {
        let tracker = tracker();
        let id = TaskId::new();
        tracker.start(&id).await;

        tracker.advance(&id, "Audio extracted", 30.0).await;
        tracker.advance(&id, "Video split", 15.0).await;

        let task = tracker.get(&id).await.unwrap();
        assert_eq!(task.current_progress, 30);
        assert_eq!(task.current_step(), Some("Video split"));
    }

    #[tokio::test]
    async fn test_complete_keeps_progress() {
        let tracker = tracker();
        let id = TaskId::new();
        tracker.start(&id).await;
        tracker.update_progress(&id, "Generating description", 40.0).await;
        tracker.complete(&id, TaskStatus::Error).await;

        let task = tracker.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.current_progress, 40);
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_task_ignores_updates() {
        let tracker = tracker();
        let id = TaskId::new();
        tracker.start(&id).await;
        tracker
            .finish(&id, TaskStatus::Completed, Some(("Task completed", 100)))
            .await;

        tracker.update_progress(&id, "late", 10.0).await;
        tracker.complete(&id, TaskStatus::Error).await;

        let task = tracker.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.current_progress, 100);
        assert_eq!(task.current_step(), Some("Task completed"));
    }

    #[tokio::test]
    async fn test_unknown_task_is_noop() {
        let tracker = tracker();
        let id = TaskId::from_string("missing");
        tracker.update_progress(&id, "x", 10.0).await;
        assert!(tracker.get(&id).await.is_none());
        assert!(tracker.is_empty().await);
    }
}
