//! RunQueue port - ロールオーバーの次回実行予約
//!
//! ジョブは完了時に「次回実行時刻」を計算してここに投入するだけで、
//! 実際にいつ起動するかはキュー側（RolloverLoop など）が決める。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ScheduleError;

#[async_trait]
pub trait RunQueue: Send + Sync {
    async fn submit(&self, run_at: DateTime<Utc>) -> Result<(), ScheduleError>;
}
