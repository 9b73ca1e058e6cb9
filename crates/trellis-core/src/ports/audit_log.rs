//! AuditLog port - ロールオーバー監査ログ
//!
//! 追記専用。書き込んだ行は更新も削除もしない。

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{RolloverLogEntry, ScheduleError, TaskId};

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: RolloverLogEntry) -> Result<(), ScheduleError>;

    /// Entries of one run date, in write order.
    async fn entries_for(&self, rollover_date: NaiveDate)
    -> Result<Vec<RolloverLogEntry>, ScheduleError>;

    /// All entries for one task, in write order.
    async fn entries_for_task(&self, task_id: TaskId) -> Result<Vec<RolloverLogEntry>, ScheduleError>;
}
