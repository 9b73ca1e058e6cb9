//! State - ロールオーバージョブの状態
//!
//! # 状態遷移
//! - Idle -> Running -> Completed -> Idle（次回実行を予約）
//! - Idle -> Running -> Failed -> Idle（失敗しても次回実行は予約する）

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl RolloverState {
    /// 実行を開始してよい状態か
    pub fn can_start(self) -> bool {
        !matches!(self, RolloverState::Running)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, RolloverState::Completed | RolloverState::Failed)
    }
}
