//! TaskStore port - タスクと依存関係の正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - タスク（日付・ロック・進捗）
//! - 依存関係（predecessor -> successor）
//!
//! # 設計原則
//! - 行単位の更新（last-write-wins）。楽観ロックは持たない
//! - カスケードは毎回ここから最新の日付を読み直すので、途中で中断しても
//!   再実行すれば収束する
//! - 非アクティブな依存関係は返さない

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Dependency, ScheduleError, ScheduleId, ScheduledTask, SpawnedType, TaskId};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: TaskId) -> Result<Option<ScheduledTask>, ScheduleError>;

    /// Tasks of one schedule, ordered by sequence.
    async fn tasks_in_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduledTask>, ScheduleError>;

    /// Active edges whose successor is `id`.
    async fn predecessors_of(&self, id: TaskId) -> Result<Vec<Dependency>, ScheduleError>;

    /// Active edges whose predecessor is `id`.
    async fn successors_of(&self, id: TaskId) -> Result<Vec<Dependency>, ScheduleError>;

    /// Persist new dates; returns the stored task.
    async fn update_dates(
        &self,
        id: TaskId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ScheduledTask, ScheduleError>;

    async fn insert_task(&self, task: ScheduledTask) -> Result<(), ScheduleError>;

    /// Insert tasks and dependencies all-or-nothing.
    async fn insert_batch(
        &self,
        tasks: Vec<ScheduledTask>,
        dependencies: Vec<Dependency>,
    ) -> Result<(), ScheduleError>;

    /// Non-hold, non-completed tasks starting strictly before `today`,
    /// ordered by (schedule, sequence). Locked tasks are included.
    async fn overdue_tasks(
        &self,
        today: NaiveDate,
        scope: Option<ScheduleId>,
    ) -> Result<Vec<ScheduledTask>, ScheduleError>;

    /// Children of `parent` spawned with the given type.
    async fn spawned_children(
        &self,
        parent: TaskId,
        spawned_type: SpawnedType,
    ) -> Result<Vec<ScheduledTask>, ScheduleError>;
}
