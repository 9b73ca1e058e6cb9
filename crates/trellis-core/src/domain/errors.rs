//! Errors - エラー型と分類
//!
//! コンポーネント内で回復できる失敗（エッジ単位・タスク単位・spawn 種別単位）は
//! レポートに集約され、ここの型は「そもそも処理を開始できない」場合にだけ返ります。

use thiserror::Error;

use super::ids::{TaskId, TemplateRowId};

/// ErrorKind は運用上の分類
///
/// - DataIntegrity: 参照切れ・循環など、データそのものの問題
/// - Persistence: 読み書きの失敗（リトライで直る可能性あり）
/// - Configuration: 設定値の問題
/// - Conflict: 同じジョブがすでに実行中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataIntegrity,
    Persistence,
    Configuration,
    Conflict,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("duplicate template row: {0}")]
    DuplicateTemplateRow(TemplateRowId),

    #[error("template row {row} references unknown predecessor {predecessor}")]
    UnknownTemplateRow {
        row: TemplateRowId,
        predecessor: TemplateRowId,
    },

    #[error("cyclic template dependencies: {}", format_cycle(.0))]
    CyclicTemplate(Vec<TemplateRowId>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rollover already running")]
    RolloverRunning,
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::TaskNotFound(_)
            | ScheduleError::DuplicateTemplateRow(_)
            | ScheduleError::UnknownTemplateRow { .. }
            | ScheduleError::CyclicTemplate(_) => ErrorKind::DataIntegrity,
            ScheduleError::Storage(_) => ErrorKind::Persistence,
            ScheduleError::Config(_) => ErrorKind::Configuration,
            ScheduleError::RolloverRunning => ErrorKind::Conflict,
        }
    }
}

fn format_cycle(rows: &[TemplateRowId]) -> String {
    rows.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
