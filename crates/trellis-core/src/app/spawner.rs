//! TaskSpawner - 完了・着手に応じて補助タスクを生成
//!
//! # ルール（種別ごとに独立して評価）
//! - photo: 親が完了していれば、完了日に 1 件
//! - certificate: 親が完了していれば、完了日 + lag 日（稼働日に寄せる）に 1 件
//! - subtask: 親が着手済み（または完了）なら、設定された名前ごとに 1 件
//!
//! 生成前に (親, 種別) で既存の子タスクを確認するので、何度呼んでも同じ結果になる。
//! 1 つの種別で失敗しても他の種別は続行し、失敗はレポートに集める。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info};

use crate::app::CalendarProvider;
use crate::domain::dependency::shift;
use crate::domain::{
    ScheduleError, ScheduledTask, SpawnedType, TaskId, TaskStatus, WorkingCalendar,
};
use crate::ports::{IdGenerator, TaskStore};

/// Sequence offset that keeps spawned tasks right after their parent.
const SPAWN_SEQUENCE_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnTrigger {
    OnCompletion,
    OnStart,
}

/// A child task the parent's configuration asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSpawn {
    pub spawned_type: SpawnedType,
    pub name: String,
    pub due_date: NaiveDate,
    pub trigger: SpawnTrigger,
    /// The parent has reached the state the trigger needs.
    pub ready: bool,
    pub already_exists: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpawnReport {
    pub spawned: Vec<ScheduledTask>,
    pub errors: Vec<String>,
}

pub struct TaskSpawner {
    store: Arc<dyn TaskStore>,
    calendars: Arc<CalendarProvider>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskSpawner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        calendars: Arc<CalendarProvider>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            calendars,
            ids,
        }
    }

    /// 足りない子タスクだけを生成する
    ///
    /// 親タスクが読めない場合だけ Err を返す。
    pub async fn spawn_all(&self, task_id: TaskId) -> Result<SpawnReport, ScheduleError> {
        let parent = self.load(task_id).await?;
        let calendar = self.calendars.calendar_for(parent.region.as_ref()).await;
        let mut report = SpawnReport::default();

        for spawned_type in [SpawnedType::Photo, SpawnedType::Certificate, SpawnedType::Subtask] {
            let wanted: Vec<Candidate> = candidates(&parent, &calendar, spawned_type)
                .into_iter()
                .filter(|c| c.ready)
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let existing = match self.store.spawned_children(parent.id, spawned_type).await {
                Ok(children) => children.into_iter().map(|c| c.name).collect::<HashSet<_>>(),
                Err(err) => {
                    report.errors.push(spawn_error(spawned_type, &err));
                    continue;
                }
            };

            for candidate in wanted {
                if exists(spawned_type, &existing, &candidate.name) {
                    continue;
                }
                let child = self.child_task(&parent, &calendar, spawned_type, candidate);
                match self.store.insert_task(child.clone()).await {
                    Ok(()) => report.spawned.push(child),
                    Err(err) => {
                        error!(parent = %parent.id, kind = spawned_type.as_str(), error = %err, "spawn failed");
                        report.errors.push(spawn_error(spawned_type, &err));
                    }
                }
            }
        }

        if !report.spawned.is_empty() {
            info!(parent = %parent.id, spawned = report.spawned.len(), "spawned follow-up tasks");
        }
        Ok(report)
    }

    /// 生成予定の一覧（保存はしない）
    pub async fn preview(&self, task_id: TaskId) -> Result<Vec<PlannedSpawn>, ScheduleError> {
        let parent = self.load(task_id).await?;
        let calendar = self.calendars.calendar_for(parent.region.as_ref()).await;

        let mut planned = Vec::new();
        for spawned_type in [SpawnedType::Photo, SpawnedType::Certificate, SpawnedType::Subtask] {
            let candidates = candidates(&parent, &calendar, spawned_type);
            if candidates.is_empty() {
                continue;
            }
            let existing: HashSet<String> = self
                .store
                .spawned_children(parent.id, spawned_type)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            planned.extend(candidates.into_iter().map(|c| PlannedSpawn {
                spawned_type,
                already_exists: exists(spawned_type, &existing, &c.name),
                name: c.name,
                due_date: c.due_date,
                trigger: c.trigger,
                ready: c.ready,
            }));
        }
        Ok(planned)
    }

    async fn load(&self, task_id: TaskId) -> Result<ScheduledTask, ScheduleError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or(ScheduleError::TaskNotFound(task_id))
    }

    fn child_task(
        &self,
        parent: &ScheduledTask,
        calendar: &WorkingCalendar,
        spawned_type: SpawnedType,
        candidate: Candidate,
    ) -> ScheduledTask {
        let mut child = ScheduledTask::new(
            self.ids.generate_task_id(),
            parent.schedule_id,
            candidate.name,
            parent.sequence_order + SPAWN_SEQUENCE_STEP,
            candidate.due_date,
            1,
        );
        child.end_date = calendar.end_date(candidate.due_date, 1);
        child.region = parent.region.clone();
        child.parent_task_id = Some(parent.id);
        child.spawned_type = spawned_type;
        child
    }
}

struct Candidate {
    name: String,
    due_date: NaiveDate,
    trigger: SpawnTrigger,
    ready: bool,
}

fn candidates(
    parent: &ScheduledTask,
    calendar: &WorkingCalendar,
    spawned_type: SpawnedType,
) -> Vec<Candidate> {
    let completed = parent.status == TaskStatus::Completed;
    let completed_on = parent.completed_on.unwrap_or(parent.end_date);
    let config = &parent.spawn;

    match spawned_type {
        SpawnedType::Photo if config.requires_photo => vec![Candidate {
            name: format!("{} - Photos", parent.name),
            due_date: calendar.next_working_day(completed_on),
            trigger: SpawnTrigger::OnCompletion,
            ready: completed,
        }],
        SpawnedType::Certificate if config.requires_certificate => vec![Candidate {
            name: format!("{} - Certificate", parent.name),
            due_date: calendar.next_working_day(shift(
                completed_on,
                i64::from(config.certificate_lag_days),
            )),
            trigger: SpawnTrigger::OnCompletion,
            ready: completed,
        }],
        SpawnedType::Subtask if config.requires_subtasks() => {
            let started = matches!(parent.status, TaskStatus::InProgress | TaskStatus::Completed);
            let due_date = calendar.next_working_day(parent.start_date);
            config
                .subtask_names
                .iter()
                .map(|name| Candidate {
                    name: name.clone(),
                    due_date,
                    trigger: SpawnTrigger::OnStart,
                    ready: started,
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Photo and certificate exist once per parent; subtasks once per name.
fn exists(spawned_type: SpawnedType, existing: &HashSet<String>, name: &str) -> bool {
    match spawned_type {
        SpawnedType::Subtask => existing.contains(name),
        _ => !existing.is_empty(),
    }
}

fn spawn_error(spawned_type: SpawnedType, err: &ScheduleError) -> String {
    format!("failed to spawn {} task: {err}", spawned_type.as_str())
}
