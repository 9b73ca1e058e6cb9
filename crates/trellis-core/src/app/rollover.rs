//! RolloverJob - 期限切れタスクを「今日」へ移動
//!
//! # 1 回の実行
//! 1. 設定タイムゾーンで「今日」を決める（Clock から）
//! 2. 開始日が今日より前・未完了・hold でないタスクを (schedule, sequence) 順に取得
//! 3. 1 件ずつ順番に処理（並列にはしない。監査ログの順序 = 評価順）
//!    - 処理直前に読み直す。前のカスケードで今日以降に動いていれば何もしない
//!    - ロック中: skipped の監査行を書いて次へ
//!    - それ以外: 次の稼働日へ移動して保存 → 後続があればカスケード → 監査行
//! 4. タスク単位の失敗は errors に集めて続行（カスケードだけの失敗なら移動は有効のまま）
//!
//! タスク一覧の取得に失敗した場合だけ Err（その回は失敗、次回の予約は scheduler 側で行う）

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info};

use crate::app::{CalendarProvider, CascadeEngine, ChangedField};
use crate::domain::{
    RolloverFailure, RolloverLogEntry, RolloverSummary, ScheduleError, ScheduleId, TaskId,
};
use crate::ports::{AuditLog, Clock, IdGenerator, TaskStore};

enum Outcome {
    /// 先に処理したタスクのカスケードで、もう期限切れではなくなった
    Superseded,
    Skipped,
    Moved {
        cascaded: Option<usize>,
        cascade_error: Option<ScheduleError>,
    },
}

pub struct RolloverJob {
    store: Arc<dyn TaskStore>,
    audit: Arc<dyn AuditLog>,
    calendars: Arc<CalendarProvider>,
    cascade: Arc<CascadeEngine>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    timezone: Tz,
}

impl RolloverJob {
    pub fn new(
        store: Arc<dyn TaskStore>,
        audit: Arc<dyn AuditLog>,
        calendars: Arc<CalendarProvider>,
        cascade: Arc<CascadeEngine>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            audit,
            calendars,
            cascade,
            clock,
            ids,
            timezone,
        }
    }

    /// 設定タイムゾーンでの今日
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.timezone).date_naive()
    }

    pub async fn run(&self, scope: Option<ScheduleId>) -> Result<RolloverSummary, ScheduleError> {
        self.calendars.invalidate().await;
        let today = self.today();

        let overdue = self.store.overdue_tasks(today, scope).await?;
        info!(%today, count = overdue.len(), "found overdue tasks");

        let mut summary = RolloverSummary {
            rollover_date: Some(today),
            ..RolloverSummary::default()
        };
        for task in overdue {
            match self.process(task.id, today).await {
                Ok(Outcome::Superseded) => {
                    debug!(task = %task.id, "no longer overdue; leaving as is");
                }
                Ok(Outcome::Skipped) => {
                    summary.processed += 1;
                    summary.skipped_locked += 1;
                }
                Ok(Outcome::Moved {
                    cascaded,
                    cascade_error,
                }) => {
                    summary.processed += 1;
                    summary.moved += 1;
                    if let Some(count) = cascaded {
                        summary.cascade_triggered += 1;
                        summary.cascaded_tasks += count;
                    }
                    if let Some(err) = cascade_error {
                        error!(task = %task.id, error = %err, "cascade after rollover failed");
                        summary.errors.push(RolloverFailure {
                            task_id: task.id,
                            message: err.to_string(),
                        });
                    }
                }
                Err(err) => {
                    summary.processed += 1;
                    error!(task = %task.id, error = %err, "rollover failed for task");
                    summary.errors.push(RolloverFailure {
                        task_id: task.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            %today,
            processed = summary.processed,
            moved = summary.moved,
            skipped_locked = summary.skipped_locked,
            cascade_triggered = summary.cascade_triggered,
            cascaded_tasks = summary.cascaded_tasks,
            errors = summary.error_count(),
            "rollover complete"
        );
        Ok(summary)
    }

    /// 1 件分の処理。一覧取得後に前のタスクのカスケードで動いている可能性があるので、
    /// 必ず読み直した最新の状態で判断する。
    async fn process(&self, task_id: TaskId, today: NaiveDate) -> Result<Outcome, ScheduleError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(Outcome::Superseded);
        };
        if task.start_date >= today || task.status.is_terminal() || task.is_hold {
            return Ok(Outcome::Superseded);
        }

        if let Some(lock) = task.lock_kind() {
            debug!(task = %task.id, lock = lock.as_str(), "locked; skipping");
            let entry = RolloverLogEntry::skipped(
                self.ids.generate_audit_id(),
                &task,
                lock,
                today,
                self.clock.now(),
            );
            self.audit.append(entry).await?;
            return Ok(Outcome::Skipped);
        }

        let calendar = self.calendars.calendar_for(task.region.as_ref()).await;
        let start = calendar.next_working_day(today);
        let end = calendar.end_date(start, task.duration_days);
        let moved = self.store.update_dates(task.id, start, end).await?;
        debug!(task = %task.id, from = %task.start_date, to = %start, "rolled over");

        let mut entry = RolloverLogEntry::moved(
            self.ids.generate_audit_id(),
            &task,
            &moved,
            today,
            self.clock.now(),
        );

        // 移動はもう保存済み。カスケードが失敗しても監査行は残す
        let (cascaded, cascade_error) = match self.cascade_from(task.id).await {
            Ok(Some(count)) => {
                entry = entry.with_cascade(count);
                (Some(count), None)
            }
            Ok(None) => (None, None),
            Err(err) => (None, Some(err)),
        };
        self.audit.append(entry).await?;
        Ok(Outcome::Moved {
            cascaded,
            cascade_error,
        })
    }

    /// 後続があればカスケードし、更新件数を返す
    async fn cascade_from(&self, task_id: TaskId) -> Result<Option<usize>, ScheduleError> {
        if self.store.successors_of(task_id).await?.is_empty() {
            return Ok(None);
        }
        let report = self
            .cascade
            .cascade(task_id, &[ChangedField::StartDate])
            .await?;
        Ok(Some(report.updated.len()))
    }
}

/// 次回実行時刻: 今日の設定時刻、すでに過ぎていれば（同時刻も含む）明日の設定時刻
///
/// DST の切り替えで存在しない時刻は 1 時間後ろへずらす。重複する時刻は早い方。
pub fn next_run_at(now: DateTime<Utc>, time: NaiveTime, timezone: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&timezone).date_naive();
    let candidate = resolve_local(today.and_time(time), timezone);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    resolve_local(tomorrow.and_time(time), timezone)
}

fn resolve_local(local: NaiveDateTime, timezone: Tz) -> DateTime<Utc> {
    timezone
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| local.and_utc())
}
