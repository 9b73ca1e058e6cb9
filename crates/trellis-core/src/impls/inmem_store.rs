//! InMemoryTaskStore - 開発・テスト用の TaskStore / AuditLog 実装
//!
//! # 実装詳細
//! - tokio::sync::Mutex で状態全体を保護（ロックを跨いで await しない）
//! - タスクは HashMap、依存関係と監査ログは Vec（書き込み順を保つ）
//! - テスト用に書き込み失敗を注入できる

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::domain::{
    Dependency, RolloverLogEntry, ScheduleError, ScheduleId, ScheduledTask, SpawnedType, TaskId,
};
use crate::ports::{AuditLog, TaskStore};

#[derive(Default)]
struct Faults {
    /// update_dates fails for these tasks.
    writes: HashSet<TaskId>,
    /// insert_task fails for spawned tasks of these types.
    spawn_inserts: HashSet<SpawnedType>,
    /// overdue_tasks fails outright.
    overdue_query: bool,
}

#[derive(Default)]
struct InMemoryState {
    tasks: HashMap<TaskId, ScheduledTask>,
    dependencies: Vec<Dependency>,
    audit: Vec<RolloverLogEntry>,
    faults: Faults,
}

impl InMemoryState {
    fn insert(&mut self, task: ScheduledTask) {
        self.tasks.insert(task.id, task);
    }

    fn sorted(mut tasks: Vec<ScheduledTask>) -> Vec<ScheduledTask> {
        tasks.sort_by(|a, b| {
            a.schedule_id
                .cmp(&b.schedule_id)
                .then(a.sequence_order.total_cmp(&b.sequence_order))
        });
        tasks
    }
}

/// In-memory store; cheap to clone (shared state).
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing rows.
    pub fn with_data(
        tasks: impl IntoIterator<Item = ScheduledTask>,
        dependencies: impl IntoIterator<Item = Dependency>,
        audit: impl IntoIterator<Item = RolloverLogEntry>,
    ) -> Self {
        let mut state = InMemoryState::default();
        for task in tasks {
            state.insert(task);
        }
        state.dependencies.extend(dependencies);
        state.audit.extend(audit);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn add_dependency(&self, dependency: Dependency) {
        self.state.lock().await.dependencies.push(dependency);
    }

    /// All tasks ordered by (schedule, sequence).
    pub async fn all_tasks(&self) -> Vec<ScheduledTask> {
        let state = self.state.lock().await;
        InMemoryState::sorted(state.tasks.values().cloned().collect())
    }

    pub async fn all_dependencies(&self) -> Vec<Dependency> {
        self.state.lock().await.dependencies.clone()
    }

    pub async fn all_audit_entries(&self) -> Vec<RolloverLogEntry> {
        self.state.lock().await.audit.clone()
    }

    /// Make `update_dates` fail for `task_id`.
    pub async fn fail_writes_for(&self, task_id: TaskId) {
        self.state.lock().await.faults.writes.insert(task_id);
    }

    pub async fn clear_write_failures(&self) {
        self.state.lock().await.faults.writes.clear();
    }

    /// Make `insert_task` fail for spawned tasks of `spawned_type`.
    pub async fn fail_spawn_inserts(&self, spawned_type: SpawnedType) {
        self.state.lock().await.faults.spawn_inserts.insert(spawned_type);
    }

    /// Make `overdue_tasks` fail.
    pub async fn fail_overdue_query(&self) {
        self.state.lock().await.faults.overdue_query = true;
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<ScheduledTask>, ScheduleError> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn tasks_in_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduledTask>, ScheduleError> {
        let state = self.state.lock().await;
        let tasks = state
            .tasks
            .values()
            .filter(|t| t.schedule_id == schedule_id)
            .cloned()
            .collect();
        Ok(InMemoryState::sorted(tasks))
    }

    async fn predecessors_of(&self, id: TaskId) -> Result<Vec<Dependency>, ScheduleError> {
        let state = self.state.lock().await;
        Ok(state
            .dependencies
            .iter()
            .filter(|d| d.active && d.successor == id)
            .cloned()
            .collect())
    }

    async fn successors_of(&self, id: TaskId) -> Result<Vec<Dependency>, ScheduleError> {
        let state = self.state.lock().await;
        Ok(state
            .dependencies
            .iter()
            .filter(|d| d.active && d.predecessor == id)
            .cloned()
            .collect())
    }

    async fn update_dates(
        &self,
        id: TaskId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ScheduledTask, ScheduleError> {
        let mut state = self.state.lock().await;
        if state.faults.writes.contains(&id) {
            return Err(ScheduleError::Storage(format!("write rejected for {id}")));
        }
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(ScheduleError::TaskNotFound(id))?;
        task.set_dates(start_date, end_date);
        Ok(task.clone())
    }

    async fn insert_task(&self, task: ScheduledTask) -> Result<(), ScheduleError> {
        let mut state = self.state.lock().await;
        if state.faults.spawn_inserts.contains(&task.spawned_type) {
            return Err(ScheduleError::Storage(format!(
                "insert rejected for {}",
                task.name
            )));
        }
        state.insert(task);
        Ok(())
    }

    async fn insert_batch(
        &self,
        tasks: Vec<ScheduledTask>,
        dependencies: Vec<Dependency>,
    ) -> Result<(), ScheduleError> {
        let mut state = self.state.lock().await;
        // All-or-nothing: check every edge before touching the maps.
        let batch_ids: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
        for dep in &dependencies {
            for end in [dep.predecessor, dep.successor] {
                if !batch_ids.contains(&end) && !state.tasks.contains_key(&end) {
                    return Err(ScheduleError::TaskNotFound(end));
                }
            }
        }
        for task in tasks {
            state.insert(task);
        }
        state.dependencies.extend(dependencies);
        Ok(())
    }

    async fn overdue_tasks(
        &self,
        today: NaiveDate,
        scope: Option<ScheduleId>,
    ) -> Result<Vec<ScheduledTask>, ScheduleError> {
        let state = self.state.lock().await;
        if state.faults.overdue_query {
            return Err(ScheduleError::Storage("overdue query failed".to_string()));
        }
        let tasks = state
            .tasks
            .values()
            .filter(|t| t.start_date < today)
            .filter(|t| !t.status.is_terminal() && !t.is_hold)
            .filter(|t| scope.is_none_or(|s| t.schedule_id == s))
            .cloned()
            .collect();
        Ok(InMemoryState::sorted(tasks))
    }

    async fn spawned_children(
        &self,
        parent: TaskId,
        spawned_type: SpawnedType,
    ) -> Result<Vec<ScheduledTask>, ScheduleError> {
        let state = self.state.lock().await;
        let children = state
            .tasks
            .values()
            .filter(|t| t.parent_task_id == Some(parent) && t.spawned_type == spawned_type)
            .cloned()
            .collect();
        Ok(InMemoryState::sorted(children))
    }
}

#[async_trait]
impl AuditLog for InMemoryTaskStore {
    async fn append(&self, entry: RolloverLogEntry) -> Result<(), ScheduleError> {
        self.state.lock().await.audit.push(entry);
        Ok(())
    }

    async fn entries_for(
        &self,
        rollover_date: NaiveDate,
    ) -> Result<Vec<RolloverLogEntry>, ScheduleError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .filter(|e| e.rollover_date == rollover_date)
            .cloned()
            .collect())
    }

    async fn entries_for_task(&self, task_id: TaskId) -> Result<Vec<RolloverLogEntry>, ScheduleError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }
}
