//! Rollover audit trail and run summaries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuditEntryId, ScheduleId, TaskId};
use super::task::{LockKind, ScheduledTask};

/// One row per task evaluated during a rollover run. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverLogEntry {
    pub id: AuditEntryId,
    pub task_id: TaskId,
    pub schedule_id: ScheduleId,
    pub rollover_date: NaiveDate,

    pub original_start_date: NaiveDate,
    pub original_end_date: NaiveDate,
    pub new_start_date: NaiveDate,
    pub new_end_date: NaiveDate,
    pub days_rolled: i64,

    pub was_skipped: bool,
    pub skip_reason: Option<String>,
    pub lock_at_rollover: Option<LockKind>,

    pub cascade_triggered: bool,
    pub cascaded_count: usize,

    pub created_at: DateTime<Utc>,
}

impl RolloverLogEntry {
    /// Entry for a locked task left where it was.
    pub fn skipped(
        id: AuditEntryId,
        task: &ScheduledTask,
        lock: LockKind,
        rollover_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id: task.id,
            schedule_id: task.schedule_id,
            rollover_date,
            original_start_date: task.start_date,
            original_end_date: task.end_date,
            new_start_date: task.start_date,
            new_end_date: task.end_date,
            days_rolled: 0,
            was_skipped: true,
            skip_reason: Some(format!("locked_{}", lock.as_str())),
            lock_at_rollover: Some(lock),
            cascade_triggered: false,
            cascaded_count: 0,
            created_at,
        }
    }

    /// Entry for a task moved from `original` to the dates now on `moved`.
    pub fn moved(
        id: AuditEntryId,
        original: &ScheduledTask,
        moved: &ScheduledTask,
        rollover_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id: original.id,
            schedule_id: original.schedule_id,
            rollover_date,
            original_start_date: original.start_date,
            original_end_date: original.end_date,
            new_start_date: moved.start_date,
            new_end_date: moved.end_date,
            days_rolled: (moved.start_date - original.start_date).num_days(),
            was_skipped: false,
            skip_reason: None,
            lock_at_rollover: None,
            cascade_triggered: false,
            cascaded_count: 0,
            created_at,
        }
    }

    pub fn with_cascade(mut self, cascaded_count: usize) -> Self {
        self.cascade_triggered = true;
        self.cascaded_count = cascaded_count;
        self
    }
}

/// A task the run could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverFailure {
    pub task_id: TaskId,
    pub message: String,
}

/// Aggregate result of one rollover run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverSummary {
    pub rollover_date: Option<NaiveDate>,
    pub processed: usize,
    pub moved: usize,
    pub skipped_locked: usize,
    pub cascade_triggered: usize,
    pub cascaded_tasks: usize,
    pub errors: Vec<RolloverFailure>,
}

impl RolloverSummary {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}
