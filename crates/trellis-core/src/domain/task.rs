//! Task record: identity, dates, lock state, provenance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::Region;
use super::ids::{ScheduleId, TaskId, TemplateRowId};

/// Progress status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// Explicit lock state stored on the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    #[default]
    None,
    SupplierConfirmed,
    Confirmed,
    Started,
    Completed,
}

/// The lock that actually applies to a task, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    SupplierConfirm,
    Confirm,
    Started,
    Completed,
    ManuallyPositioned,
}

impl LockKind {
    /// Lock priority (lower = stronger lock).
    pub fn priority(self) -> u8 {
        match self {
            LockKind::SupplierConfirm => 1,
            LockKind::Confirm => 2,
            LockKind::Started => 3,
            LockKind::Completed => 4,
            LockKind::ManuallyPositioned => 5,
        }
    }

    /// Started and completed work cannot be unlocked by a user.
    pub fn is_unlockable(self) -> bool {
        !matches!(self, LockKind::Started | LockKind::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockKind::SupplierConfirm => "supplier_confirm",
            LockKind::Confirm => "confirm",
            LockKind::Started => "started",
            LockKind::Completed => "completed",
            LockKind::ManuallyPositioned => "manually_positioned",
        }
    }
}

/// Kind of auxiliary task produced by the spawner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnedType {
    #[default]
    None,
    Photo,
    Certificate,
    Subtask,
}

impl SpawnedType {
    pub fn as_str(self) -> &'static str {
        match self {
            SpawnedType::None => "none",
            SpawnedType::Photo => "photo",
            SpawnedType::Certificate => "certificate",
            SpawnedType::Subtask => "subtask",
        }
    }
}

/// Which auxiliary tasks a task asks for. Opaque to everything but the spawner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default)]
    pub requires_photo: bool,

    #[serde(default)]
    pub requires_certificate: bool,

    /// Days after completion that the certificate is due.
    #[serde(default = "default_certificate_lag")]
    pub certificate_lag_days: u32,

    #[serde(default)]
    pub subtask_names: Vec<String>,
}

fn default_certificate_lag() -> u32 {
    10
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            requires_photo: false,
            requires_certificate: false,
            certificate_lag_days: default_certificate_lag(),
            subtask_names: Vec::new(),
        }
    }
}

impl SpawnConfig {
    pub fn requires_subtasks(&self) -> bool {
        !self.subtask_names.is_empty()
    }
}

/// A schedulable unit.
///
/// Invariant: `end_date >= start_date`. The cascade engine and the rollover
/// job never write dates to a task for which [`ScheduledTask::lock_kind`]
/// returns `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub schedule_id: ScheduleId,
    pub name: String,

    /// Float ordering so tasks can be inserted between existing ones.
    pub sequence_order: f64,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: u32,

    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub lock: LockState,
    #[serde(default)]
    pub manually_positioned: bool,

    /// Hold tasks block a whole schedule and are never rolled over.
    #[serde(default)]
    pub is_hold: bool,

    #[serde(default)]
    pub region: Option<Region>,

    #[serde(default)]
    pub completed_on: Option<NaiveDate>,

    #[serde(default)]
    pub template_row_id: Option<TemplateRowId>,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    #[serde(default)]
    pub spawned_type: SpawnedType,

    #[serde(default)]
    pub spawn: SpawnConfig,
}

impl ScheduledTask {
    /// New unlocked, not-started task with `end_date == start_date`.
    pub fn new(
        id: TaskId,
        schedule_id: ScheduleId,
        name: impl Into<String>,
        sequence_order: f64,
        start_date: NaiveDate,
        duration_days: u32,
    ) -> Self {
        Self {
            id,
            schedule_id,
            name: name.into(),
            sequence_order,
            start_date,
            end_date: start_date,
            duration_days,
            status: TaskStatus::NotStarted,
            lock: LockState::None,
            manually_positioned: false,
            is_hold: false,
            region: None,
            completed_on: None,
            template_row_id: None,
            parent_task_id: None,
            spawned_type: SpawnedType::None,
            spawn: SpawnConfig::default(),
        }
    }

    /// Effective lock, checked in priority order.
    pub fn lock_kind(&self) -> Option<LockKind> {
        match self.lock {
            LockState::SupplierConfirmed => return Some(LockKind::SupplierConfirm),
            LockState::Confirmed => return Some(LockKind::Confirm),
            LockState::Started => return Some(LockKind::Started),
            LockState::Completed => return Some(LockKind::Completed),
            LockState::None => {}
        }
        match self.status {
            TaskStatus::InProgress => return Some(LockKind::Started),
            TaskStatus::Completed => return Some(LockKind::Completed),
            TaskStatus::NotStarted => {}
        }
        self.manually_positioned.then_some(LockKind::ManuallyPositioned)
    }

    /// Immovable by the cascade engine and the rollover job.
    pub fn is_locked(&self) -> bool {
        self.lock_kind().is_some()
    }

    pub fn set_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        self.start_date = start;
        self.end_date = end.max(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn task() -> ScheduledTask {
        ScheduledTask::new(
            TaskId::from_u128(1),
            ScheduleId::from_u128(100),
            "Frame walls",
            1.0,
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            2,
        )
    }

    #[test]
    fn new_task_is_unlocked() {
        let t = task();
        assert_eq!(t.lock_kind(), None);
        assert!(!t.is_locked());
    }

    #[rstest]
    #[case::supplier(LockState::SupplierConfirmed, LockKind::SupplierConfirm)]
    #[case::confirm(LockState::Confirmed, LockKind::Confirm)]
    #[case::started(LockState::Started, LockKind::Started)]
    #[case::completed(LockState::Completed, LockKind::Completed)]
    fn explicit_lock_states(#[case] state: LockState, #[case] expected: LockKind) {
        let mut t = task();
        t.lock = state;
        assert_eq!(t.lock_kind(), Some(expected));
    }

    #[test]
    fn status_implies_lock() {
        let mut t = task();
        t.status = TaskStatus::InProgress;
        assert_eq!(t.lock_kind(), Some(LockKind::Started));
        t.status = TaskStatus::Completed;
        assert_eq!(t.lock_kind(), Some(LockKind::Completed));
    }

    #[test]
    fn explicit_lock_outranks_manual_position() {
        let mut t = task();
        t.manually_positioned = true;
        assert_eq!(t.lock_kind(), Some(LockKind::ManuallyPositioned));
        t.lock = LockState::SupplierConfirmed;
        assert_eq!(t.lock_kind(), Some(LockKind::SupplierConfirm));
    }

    #[test]
    fn lock_priority_and_unlockable() {
        assert!(LockKind::SupplierConfirm.priority() < LockKind::ManuallyPositioned.priority());
        assert!(LockKind::Confirm.is_unlockable());
        assert!(!LockKind::Started.is_unlockable());
        assert!(!LockKind::Completed.is_unlockable());
    }

    #[test]
    fn set_dates_keeps_end_after_start() {
        let mut t = task();
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        t.set_dates(start, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        assert_eq!(t.end_date, start);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"
        {
          "id": "00000000000000000000000001",
          "schedule_id": "00000000000000000000000002",
          "name": "Slab",
          "sequence_order": 1.5,
          "start_date": "2025-03-03",
          "end_date": "2025-03-04",
          "duration_days": 2
        }"#;
        let t: ScheduledTask = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, TaskStatus::NotStarted);
        assert_eq!(t.lock, LockState::None);
        assert_eq!(t.spawn.certificate_lag_days, 10);
        assert_eq!(t.spawned_type, SpawnedType::None);
    }
}
