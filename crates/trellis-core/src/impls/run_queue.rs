//! RunQueue の実装
//!
//! - **ChannelRunQueue**: mpsc チャネル経由で RolloverLoop に実行時刻を渡す
//! - **RecordingRunQueue**: 投入された時刻を記録するだけ（テスト・単発実行用）

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};

use crate::domain::ScheduleError;
use crate::ports::RunQueue;

/// mpsc の送信側。受信側は RolloverLoop が持つ
#[derive(Clone)]
pub struct ChannelRunQueue {
    tx: mpsc::UnboundedSender<DateTime<Utc>>,
}

impl ChannelRunQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DateTime<Utc>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RunQueue for ChannelRunQueue {
    async fn submit(&self, run_at: DateTime<Utc>) -> Result<(), ScheduleError> {
        self.tx
            .send(run_at)
            .map_err(|_| ScheduleError::Storage("run queue receiver dropped".to_string()))
    }
}

#[derive(Clone, Default)]
pub struct RecordingRunQueue {
    submitted: Arc<Mutex<Vec<DateTime<Utc>>>>,
}

impl RecordingRunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submitted(&self) -> Vec<DateTime<Utc>> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl RunQueue for RecordingRunQueue {
    async fn submit(&self, run_at: DateTime<Utc>) -> Result<(), ScheduleError> {
        self.submitted.lock().await.push(run_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (queue, mut rx) = ChannelRunQueue::new();
        let first = Utc.with_ymd_and_hms(2025, 3, 6, 13, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 3, 7, 13, 0, 0).unwrap();

        queue.submit(first).await.unwrap();
        queue.submit(second).await.unwrap();

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn channel_errors_after_receiver_drop() {
        let (queue, rx) = ChannelRunQueue::new();
        drop(rx);

        let err = queue.submit(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Storage(_)));
    }
}
