//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const TASKS_SUBMITTED_TOTAL: &str = "vdesc_tasks_submitted_total";
    pub const TASKS_COMPLETED_TOTAL: &str = "vdesc_tasks_completed_total";
    pub const TASKS_FAILED_TOTAL: &str = "vdesc_tasks_failed_total";
    pub const TASKS_RUNNING: &str = "vdesc_tasks_running";
    pub const TASKS_EVICTED_TOTAL: &str = "vdesc_tasks_evicted_total";
    pub const STAGE_DURATION_SECONDS: &str = "vdesc_stage_duration_seconds";
}

pub fn record_task_submitted(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::TASKS_SUBMITTED_TOTAL, &labels).increment(1);
    gauge!(names::TASKS_RUNNING).increment(1.0);
}

pub fn record_task_completed(duration_secs: f64) {
    counter!(names::TASKS_COMPLETED_TOTAL).increment(1);
    gauge!(names::TASKS_RUNNING).decrement(1.0);
    record_stage_duration("total", duration_secs);
}

pub fn record_task_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::TASKS_FAILED_TOTAL, &labels).increment(1);
    gauge!(names::TASKS_RUNNING).decrement(1.0);
}

pub fn record_evictions(table: &str, count: usize) {
    let labels = [("table", table.to_string())];
    counter!(names::TASKS_EVICTED_TOTAL, &labels).increment(count as u64);
}

/// Record how long one pipeline stage took.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}
