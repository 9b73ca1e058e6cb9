//! CascadeEngine - 日付変更を後続タスクへ伝播
//!
//! # アルゴリズム
//! 1. root から後続を BFS でたどり、到達可能な部分グラフを集める（visited で 1 回だけ）
//! 2. 部分グラフをトポロジカル順（同順位は BFS の発見順）に並べる
//!    - 循環に引っかかったタスクは警告を出し、最後に発見順で評価する
//! 3. 各タスクを 1 回だけ評価する
//!    - ロック中: skipped に記録し、日付はそのまま（後続は現在の日付を制約に使う）
//!    - それ以外: 全アクティブ先行タスクの制約日の最大値 → 次の稼働日 → 終了日
//!    - 開始日か終了日が変わったときだけ保存して updated に入れる
//!
//! 先行タスクの日付は毎回 TaskStore から読み直すので、途中で失敗しても
//! 同じ root で再実行すれば同じ最終状態に収束する。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::CalendarProvider;
use crate::domain::{
    DependencyGraph, LockKind, ScheduleError, ScheduledTask, TaskId, WorkingCalendar,
};
use crate::ports::TaskStore;

/// Which field of the root task the caller changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    StartDate,
    Duration,
    LockState,
    Other,
}

impl ChangedField {
    pub fn triggers_cascade(self) -> bool {
        matches!(self, ChangedField::StartDate | ChangedField::Duration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: TaskId,
    pub lock: LockKind,
}

/// Result of one cascade invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    /// The caller-modified root, when the change triggered propagation.
    pub root: Option<ScheduledTask>,
    /// Tasks whose persisted dates this invocation changed, in write order.
    pub updated: Vec<ScheduledTask>,
    pub skipped: Vec<SkippedTask>,
    pub warnings: Vec<String>,
}

impl CascadeReport {
    /// Root (if modified by the caller) followed by every updated task.
    pub fn affected(&self) -> Vec<&ScheduledTask> {
        self.root.iter().chain(self.updated.iter()).collect()
    }

    pub fn affected_ids(&self) -> Vec<TaskId> {
        self.affected().into_iter().map(|t| t.id).collect()
    }
}

/// Dry-run view of moving one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadePreview {
    pub task_id: TaskId,
    pub name: String,
    pub old_start_date: NaiveDate,
    pub old_end_date: NaiveDate,
    pub new_start_date: NaiveDate,
    pub new_end_date: NaiveDate,
    pub date_delta: i64,
    pub unlocked_successors: Vec<PreviewedSuccessor>,
    pub blocked_successors: Vec<BlockedSuccessor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewedSuccessor {
    pub task_id: TaskId,
    pub name: String,
    pub old_start_date: NaiveDate,
    pub old_end_date: NaiveDate,
    pub new_start_date: NaiveDate,
    pub new_end_date: NaiveDate,
    /// Active edges leaving this successor.
    pub nested_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedSuccessor {
    pub task_id: TaskId,
    pub name: String,
    pub old_start_date: NaiveDate,
    /// Where the task would land if it were not locked.
    pub would_move_to: NaiveDate,
    pub lock: LockKind,
    pub lock_priority: u8,
    pub unlockable: bool,
}

pub struct CascadeEngine {
    store: Arc<dyn TaskStore>,
    calendars: Arc<CalendarProvider>,
}

impl CascadeEngine {
    pub fn new(store: Arc<dyn TaskStore>, calendars: Arc<CalendarProvider>) -> Self {
        Self { store, calendars }
    }

    /// root の変更を後続タスクへ伝播する
    ///
    /// root 自体の日付は呼び出し側がすでに保存している前提で、ここでは書き換えない。
    /// 保存の失敗はそのまま返す（再実行で収束する）。
    pub async fn cascade(
        &self,
        root: TaskId,
        changed_fields: &[ChangedField],
    ) -> Result<CascadeReport, ScheduleError> {
        let root_task = self
            .store
            .get_task(root)
            .await?
            .ok_or(ScheduleError::TaskNotFound(root))?;

        let mut report = CascadeReport::default();
        if !changed_fields.iter().any(|f| f.triggers_cascade()) {
            debug!(task = %root, "change does not affect dates; nothing to cascade");
            return Ok(report);
        }
        report.root = Some(root_task);

        let order = self.evaluation_order(root, &mut report.warnings).await?;
        for task_id in order {
            self.evaluate(task_id, &mut report).await?;
        }

        info!(
            root = %root,
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings.len(),
            "cascade complete"
        );
        Ok(report)
    }

    /// Every task reachable from `root` (excluding `root`), in BFS order.
    pub async fn downstream_of(&self, root: TaskId) -> Result<Vec<TaskId>, ScheduleError> {
        let (discovered, _) = self.discover(root, &mut Vec::new()).await?;
        Ok(discovered)
    }

    /// root を new_start に動かした場合の直接の後続への影響（保存はしない）
    pub async fn preview(
        &self,
        root: TaskId,
        new_start: NaiveDate,
    ) -> Result<CascadePreview, ScheduleError> {
        let task = self
            .store
            .get_task(root)
            .await?
            .ok_or(ScheduleError::TaskNotFound(root))?;

        let calendar = self.calendars.calendar_for(task.region.as_ref()).await;
        let mut moved = task.clone();
        let start = calendar.next_working_day(new_start);
        moved.set_dates(start, calendar.end_date(start, task.duration_days));

        let mut unlocked_successors = Vec::new();
        let mut blocked_successors = Vec::new();
        for edge in self.store.successors_of(root).await? {
            let Some(successor) = self.store.get_task(edge.successor).await? else {
                warn!(predecessor = %root, successor = %edge.successor, "dependency references missing task");
                continue;
            };
            let calendar = self.calendars.calendar_for(successor.region.as_ref()).await;
            let start = self
                .earliest_start(&successor, Some(&moved), &mut Vec::new())
                .await?
                .map_or(successor.start_date, |d| calendar.next_working_day(d));

            match successor.lock_kind() {
                Some(lock) => blocked_successors.push(BlockedSuccessor {
                    task_id: successor.id,
                    name: successor.name,
                    old_start_date: successor.start_date,
                    would_move_to: start,
                    lock,
                    lock_priority: lock.priority(),
                    unlockable: lock.is_unlockable(),
                }),
                None => {
                    let nested_count = self.store.successors_of(successor.id).await?.len();
                    unlocked_successors.push(PreviewedSuccessor {
                        task_id: successor.id,
                        name: successor.name,
                        old_start_date: successor.start_date,
                        old_end_date: successor.end_date,
                        new_start_date: start,
                        new_end_date: calendar.end_date(start, successor.duration_days),
                        nested_count,
                    });
                }
            }
        }

        Ok(CascadePreview {
            task_id: task.id,
            name: task.name.clone(),
            old_start_date: task.start_date,
            old_end_date: task.end_date,
            new_start_date: moved.start_date,
            new_end_date: moved.end_date,
            date_delta: (moved.start_date - task.start_date).num_days(),
            unlocked_successors,
            blocked_successors,
        })
    }

    /// BFS で到達可能なタスクを集め、評価順に並べる
    async fn evaluation_order(
        &self,
        root: TaskId,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<TaskId>, ScheduleError> {
        let (discovered, graph) = self.discover(root, warnings).await?;
        let index: HashMap<TaskId, usize> =
            discovered.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let position = |id: &TaskId| index.get(id).copied().unwrap_or(usize::MAX);

        match graph.topological_order_by(&discovered, position) {
            Ok(order) => Ok(order),
            Err(stuck) => {
                let message = format!(
                    "dependency cycle among {} task(s): {}",
                    stuck.len(),
                    join_ids(&stuck)
                );
                warn!(root = %root, "{message}");
                warnings.push(message);

                let stuck_set: HashSet<TaskId> = stuck.iter().copied().collect();
                let acyclic: Vec<TaskId> = discovered
                    .iter()
                    .copied()
                    .filter(|id| !stuck_set.contains(id))
                    .collect();
                let mut order = graph
                    .topological_order_by(&acyclic, position)
                    .unwrap_or(acyclic);
                order.extend(stuck);
                Ok(order)
            }
        }
    }

    async fn discover(
        &self,
        root: TaskId,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<TaskId>, DependencyGraph<TaskId>), ScheduleError> {
        let mut graph = DependencyGraph::new();
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        let mut discovered = Vec::new();

        while let Some(current) = queue.pop_front() {
            for edge in self.store.successors_of(current).await? {
                let next = edge.successor;
                graph.add_dependency(next, current);
                if next == root {
                    let message = format!("dependency cycle returns to root {root} via {current}");
                    warn!("{message}");
                    warnings.push(message);
                    continue;
                }
                if visited.insert(next) {
                    discovered.push(next);
                    queue.push_back(next);
                }
            }
        }
        Ok((discovered, graph))
    }

    async fn evaluate(&self, task_id: TaskId, report: &mut CascadeReport) -> Result<(), ScheduleError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            let message = format!("dependency references missing task {task_id}");
            warn!("{message}");
            report.warnings.push(message);
            return Ok(());
        };

        if let Some(lock) = task.lock_kind() {
            debug!(task = %task.id, lock = lock.as_str(), "locked; keeping dates");
            report.skipped.push(SkippedTask { task_id, lock });
            return Ok(());
        }

        let Some(constraint) = self.earliest_start(&task, None, &mut report.warnings).await? else {
            return Ok(());
        };

        let calendar = self.calendars.calendar_for(task.region.as_ref()).await;
        let (start, end) = schedule_on(&calendar, constraint, task.duration_days);
        if start == task.start_date && end == task.end_date {
            return Ok(());
        }

        debug!(task = %task.id, from = %task.start_date, to = %start, "moving task");
        let stored = self.store.update_dates(task.id, start, end).await?;
        report.updated.push(stored);
        Ok(())
    }

    /// 全アクティブ先行タスクの制約日の最大値（先行タスクがなければ None）
    ///
    /// `overlay` を渡すと、そのタスクだけ保存済みの日付の代わりに使う。
    async fn earliest_start(
        &self,
        task: &ScheduledTask,
        overlay: Option<&ScheduledTask>,
        warnings: &mut Vec<String>,
    ) -> Result<Option<NaiveDate>, ScheduleError> {
        let mut latest: Option<NaiveDate> = None;
        for edge in self.store.predecessors_of(task.id).await? {
            let predecessor = match overlay {
                Some(o) if o.id == edge.predecessor => Some(o.clone()),
                _ => self.store.get_task(edge.predecessor).await?,
            };
            let Some(predecessor) = predecessor else {
                let message = format!(
                    "task {} references missing predecessor {}",
                    task.id, edge.predecessor
                );
                warn!("{message}");
                warnings.push(message);
                continue;
            };
            let candidate = edge.constraint_for(&predecessor, task);
            latest = Some(latest.map_or(candidate, |l| l.max(candidate)));
        }
        Ok(latest)
    }
}

/// 制約日を稼働日に寄せ、期間から終了日を求める
pub(crate) fn schedule_on(
    calendar: &WorkingCalendar,
    earliest: NaiveDate,
    duration_days: u32,
) -> (NaiveDate, NaiveDate) {
    let start = calendar.next_working_day(earliest);
    (start, calendar.end_date(start, duration_days))
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
