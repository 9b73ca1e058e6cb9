//! RolloverScheduler / RolloverLoop - ロールオーバーの定期実行
//!
//! # 状態遷移
//! Idle -> Running -> Completed | Failed -> Idle
//!
//! 実行が終わるたびに（失敗しても）次回時刻を next_run_at で計算して RunQueue に投入する。
//! RolloverLoop は ChannelRunQueue の受信側を持ち、時刻まで sleep してから実行する。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::RolloverJob;
use crate::app::rollover::next_run_at;
use crate::config::RolloverSettings;
use crate::domain::{RolloverState, RolloverSummary, ScheduleError, ScheduleId};
use crate::ports::{Clock, RunQueue};

#[derive(Debug, Default)]
struct SchedulerState {
    current: RolloverState,
    last_finished: Option<RolloverState>,
}

pub struct RolloverScheduler {
    job: Arc<RolloverJob>,
    queue: Arc<dyn RunQueue>,
    clock: Arc<dyn Clock>,
    settings: RolloverSettings,
    state: Mutex<SchedulerState>,
}

impl RolloverScheduler {
    pub fn new(
        job: Arc<RolloverJob>,
        queue: Arc<dyn RunQueue>,
        clock: Arc<dyn Clock>,
        settings: RolloverSettings,
    ) -> Self {
        Self {
            job,
            queue,
            clock,
            settings,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub async fn state(&self) -> RolloverState {
        self.state.lock().await.current
    }

    /// 直近の実行結果（Completed / Failed）
    pub async fn last_finished(&self) -> Option<RolloverState> {
        self.state.lock().await.last_finished
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 最初の実行を予約する。無効なら何もしない
    pub async fn start(&self) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        if !self.settings.enabled {
            info!("rollover disabled; not scheduling");
            return Ok(None);
        }
        let run_at = self.schedule_next().await?;
        info!(%run_at, "rollover scheduled");
        Ok(Some(run_at))
    }

    /// 予約された実行。無効化されていれば実行も次回予約もしない
    pub async fn run_scheduled(&self) -> Result<Option<RolloverSummary>, ScheduleError> {
        if !self.settings.enabled {
            info!("rollover disabled; skipping scheduled run");
            return Ok(None);
        }
        self.execute(None, true).await.map(Some)
    }

    /// 手動実行。enabled に関係なく実行し、次回予約はしない
    pub async fn run_now(&self, scope: Option<ScheduleId>) -> Result<RolloverSummary, ScheduleError> {
        self.execute(scope, false).await
    }

    async fn execute(
        &self,
        scope: Option<ScheduleId>,
        reschedule: bool,
    ) -> Result<RolloverSummary, ScheduleError> {
        {
            let mut state = self.state.lock().await;
            if !state.current.can_start() {
                return Err(ScheduleError::RolloverRunning);
            }
            state.current = RolloverState::Running;
        }

        let result = self.job.run(scope).await;
        let finished = match &result {
            Ok(_) => RolloverState::Completed,
            Err(err) => {
                error!(error = %err, "rollover run failed");
                RolloverState::Failed
            }
        };
        self.transition(finished).await;

        if reschedule {
            match self.schedule_next().await {
                Ok(run_at) => info!(%run_at, "next rollover scheduled"),
                Err(err) => error!(error = %err, "could not schedule next rollover"),
            }
        }

        self.transition(RolloverState::Idle).await;
        result
    }

    async fn transition(&self, next: RolloverState) {
        let mut state = self.state.lock().await;
        state.current = next;
        if next.is_finished() {
            state.last_finished = Some(next);
        }
    }

    async fn schedule_next(&self) -> Result<DateTime<Utc>, ScheduleError> {
        let run_at = next_run_at(self.clock.now(), self.settings.time, self.settings.timezone);
        self.queue.submit(run_at).await?;
        Ok(run_at)
    }
}

/// Background loop handle.
/// - `request_shutdown()` で待機中の sleep を抜けて停止する
/// - 実行中のロールオーバーは最後まで走らせる
pub struct RolloverLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RolloverLoop {
    pub fn spawn(
        scheduler: Arc<RolloverScheduler>,
        runs: mpsc::UnboundedReceiver<DateTime<Utc>>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            rollover_loop(scheduler, runs, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn rollover_loop(
    scheduler: Arc<RolloverScheduler>,
    mut runs: mpsc::UnboundedReceiver<DateTime<Utc>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let run_at = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = runs.recv() => match next {
                Some(run_at) => run_at,
                None => break,
            },
        };

        let wait = (run_at - scheduler.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if let Err(err) = scheduler.run_scheduled().await {
            warn!(error = %err, "scheduled rollover did not complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{CalendarProvider, CascadeEngine};
    use crate::config::CalendarSettings;
    use crate::domain::{ScheduledTask, TaskId};
    use crate::impls::{ChannelRunQueue, InMemoryHolidays, InMemoryTaskStore, RecordingRunQueue};
    use crate::ports::{FixedClock, TaskStore, UlidGenerator};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn now() -> DateTime<Utc> {
        // Thursday 6 March 2025, 10:00 in Sydney.
        Utc.with_ymd_and_hms(2025, 3, 5, 23, 0, 0).unwrap()
    }

    fn overdue_store() -> InMemoryTaskStore {
        let t = ScheduledTask::new(
            TaskId::from_u128(1),
            crate::domain::ScheduleId::from_u128(1),
            "Frame inspection",
            1.0,
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            1,
        );
        InMemoryTaskStore::with_data([t], [], [])
    }

    fn scheduler(
        store: &InMemoryTaskStore,
        queue: Arc<dyn RunQueue>,
        enabled: bool,
    ) -> RolloverScheduler {
        let clock = FixedClock::new(now());
        let store_port: Arc<dyn TaskStore> = Arc::new(store.clone());
        let calendars = Arc::new(CalendarProvider::new(
            CalendarSettings::default(),
            Arc::new(InMemoryHolidays::default()),
        ));
        let cascade = Arc::new(CascadeEngine::new(store_port.clone(), calendars.clone()));
        let settings = RolloverSettings {
            enabled,
            ..RolloverSettings::default()
        };
        let job = RolloverJob::new(
            store_port,
            Arc::new(store.clone()),
            calendars,
            cascade,
            Arc::new(clock),
            Arc::new(UlidGenerator::new(clock)),
            settings.timezone,
        );
        RolloverScheduler::new(Arc::new(job), queue, Arc::new(clock), settings)
    }

    #[tokio::test]
    async fn completed_run_reschedules_for_next_midnight() {
        let queue = RecordingRunQueue::new();
        let scheduler = scheduler(&overdue_store(), Arc::new(queue.clone()), true);

        let summary = scheduler.run_scheduled().await.unwrap().unwrap();

        assert_eq!(summary.moved, 1);
        assert_eq!(scheduler.state().await, RolloverState::Idle);
        assert_eq!(scheduler.last_finished().await, Some(RolloverState::Completed));
        let expected = next_run_at(now(), NaiveTime::default(), chrono_tz::Australia::Sydney);
        assert_eq!(queue.submitted().await, vec![expected]);
    }

    #[tokio::test]
    async fn failed_run_still_reschedules() {
        let store = overdue_store();
        store.fail_overdue_query().await;
        let queue = RecordingRunQueue::new();
        let scheduler = scheduler(&store, Arc::new(queue.clone()), true);

        assert!(scheduler.run_scheduled().await.is_err());

        assert_eq!(scheduler.last_finished().await, Some(RolloverState::Failed));
        assert_eq!(scheduler.state().await, RolloverState::Idle);
        assert_eq!(queue.submitted().await.len(), 1);
    }

    #[tokio::test]
    async fn disabled_scheduler_neither_runs_nor_reschedules() {
        let store = overdue_store();
        let queue = RecordingRunQueue::new();
        let scheduler = scheduler(&store, Arc::new(queue.clone()), false);

        assert_eq!(scheduler.start().await.unwrap(), None);
        assert!(scheduler.run_scheduled().await.unwrap().is_none());
        assert!(queue.submitted().await.is_empty());
        assert!(store.all_audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn manual_trigger_ignores_enabled_flag_and_does_not_reschedule() {
        let store = overdue_store();
        let queue = RecordingRunQueue::new();
        let scheduler = scheduler(&store, Arc::new(queue.clone()), false);

        let summary = scheduler.run_now(None).await.unwrap();

        assert_eq!(summary.moved, 1);
        assert!(queue.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn loop_runs_due_instant_and_stops_on_shutdown() {
        let store = overdue_store();
        let (queue, runs) = ChannelRunQueue::new();
        let scheduler = Arc::new(scheduler(&store, Arc::new(queue.clone()), true));
        let rollover_loop = RolloverLoop::spawn(scheduler.clone(), runs);

        // Already due: runs immediately.
        queue.submit(now()).await.unwrap();

        let mut finished = None;
        for _ in 0..200 {
            finished = scheduler.last_finished().await;
            if finished.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(finished, Some(RolloverState::Completed));
        assert_eq!(store.all_audit_entries().await.len(), 1);

        // The next run is hours away; shutdown must not wait for it.
        tokio::time::timeout(Duration::from_secs(5), rollover_loop.shutdown_and_join())
            .await
            .unwrap();
    }
}
