//! TemplateInstantiator - テンプレートからタスク一式を生成
//!
//! # フロー
//! 1. 検証: 行 ID の重複・存在しない先行行・循環（自己参照を含む）を拒否
//! 2. 並べ替え: sequence_order がトポロジカル順になっていなければ並べ替えて振り直す
//! 3. 前進パス: 上から順に、開始日 = max(基準日 + offset, 各先行の制約日) → 稼働日に寄せる
//! 4. タスクと依存関係を insert_batch で一括保存（全部成功か全部失敗）

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::app::CalendarProvider;
use crate::app::cascade::schedule_on;
use crate::domain::dependency::shift;
use crate::domain::{
    Dependency, DependencyGraph, Region, ScheduleError, ScheduleId, ScheduleTemplate,
    ScheduledTask, TaskId, TemplateRow, TemplateRowId,
};
use crate::ports::{IdGenerator, TaskStore};

#[derive(Debug, Clone, Serialize)]
pub struct InstantiationReport {
    pub schedule_id: ScheduleId,
    pub tasks: Vec<ScheduledTask>,
    pub dependencies: Vec<Dependency>,
    /// Rows had to be reordered to respect their predecessors.
    pub reordered: bool,
    pub first_start: Option<NaiveDate>,
    pub last_end: Option<NaiveDate>,
}

pub struct TemplateInstantiator {
    store: Arc<dyn TaskStore>,
    calendars: Arc<CalendarProvider>,
    ids: Arc<dyn IdGenerator>,
}

impl TemplateInstantiator {
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

    pub async fn instantiate(
        &self,
        template: &ScheduleTemplate,
        schedule_id: ScheduleId,
        start: NaiveDate,
        region: Option<Region>,
    ) -> Result<InstantiationReport, ScheduleError> {
        let (rows, reordered) = ordered_rows(template)?;
        if reordered {
            info!(template = %template.name, "rows reordered to follow their predecessors");
        }

        let calendar = self.calendars.calendar_for(region.as_ref()).await;
        let mut task_of_row: HashMap<TemplateRowId, usize> = HashMap::new();
        let mut tasks: Vec<ScheduledTask> = Vec::with_capacity(rows.len());
        let mut dependencies = Vec::new();

        for (position, row) in rows.iter().enumerate() {
            let id: TaskId = self.ids.generate_task_id();

            let mut earliest = shift(start, i64::from(row.start_offset_days));
            for pred in &row.predecessors {
                // 検証済みなので先行行は必ず生成済み
                let Some(&index) = task_of_row.get(&pred.row) else {
                    continue;
                };
                let predecessor = &tasks[index];
                let candidate = pred.kind.constraint_date(
                    predecessor.start_date,
                    predecessor.end_date,
                    pred.lag_days,
                    row.duration_days,
                );
                earliest = earliest.max(candidate);
                dependencies.push(Dependency::new(predecessor.id, id, pred.kind, pred.lag_days));
            }

            let sequence_order = if reordered {
                (position + 1) as f64
            } else {
                row.sequence_order
            };
            let (task_start, task_end) = schedule_on(&calendar, earliest, row.duration_days);
            let mut task = ScheduledTask::new(
                id,
                schedule_id,
                row.name.clone(),
                sequence_order,
                task_start,
                row.duration_days,
            );
            task.end_date = task_end;
            task.region = region.clone();
            task.template_row_id = Some(row.id);
            task.spawn = row.spawn.clone();

            task_of_row.insert(row.id, tasks.len());
            tasks.push(task);
        }

        self.store
            .insert_batch(tasks.clone(), dependencies.clone())
            .await?;

        let first_start = tasks.iter().map(|t| t.start_date).min();
        let last_end = tasks.iter().map(|t| t.end_date).max();
        info!(
            template = %template.name,
            schedule = %schedule_id,
            tasks = tasks.len(),
            dependencies = dependencies.len(),
            "template instantiated"
        );

        Ok(InstantiationReport {
            schedule_id,
            tasks,
            dependencies,
            reordered,
            first_start,
            last_end,
        })
    }
}

/// Validate the template and return its rows in a dependency-respecting
/// order, plus whether that order differs from `sequence_order`.
fn ordered_rows(template: &ScheduleTemplate) -> Result<(Vec<&TemplateRow>, bool), ScheduleError> {
    let mut by_id: HashMap<TemplateRowId, &TemplateRow> = HashMap::new();
    for row in &template.rows {
        if by_id.insert(row.id, row).is_some() {
            return Err(ScheduleError::DuplicateTemplateRow(row.id));
        }
    }

    let mut graph = DependencyGraph::new();
    for row in &template.rows {
        graph.add_node(row.id);
        for pred in &row.predecessors {
            if !by_id.contains_key(&pred.row) {
                return Err(ScheduleError::UnknownTemplateRow {
                    row: row.id,
                    predecessor: pred.row,
                });
            }
            graph.add_dependency(row.id, pred.row);
        }
    }
    if let Some(cycle) = graph.detect_cycle() {
        return Err(ScheduleError::CyclicTemplate(cycle));
    }

    let mut by_sequence: Vec<&TemplateRow> = template.rows.iter().collect();
    by_sequence.sort_by(|a, b| a.sequence_order.total_cmp(&b.sequence_order));
    let sequence_ids: Vec<TemplateRowId> = by_sequence.iter().map(|r| r.id).collect();
    let rank: HashMap<TemplateRowId, usize> =
        sequence_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let order = graph
        .topological_order_by(&sequence_ids, |id| rank.get(id).copied().unwrap_or(usize::MAX))
        .map_err(ScheduleError::CyclicTemplate)?;
    let reordered = order != sequence_ids;
    let rows = order.iter().filter_map(|id| by_id.get(id).copied()).collect();
    Ok((rows, reordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalendarSettings;
    use crate::domain::{DependencyType, WorkingCalendar};
    use crate::impls::{InMemoryHolidays, InMemoryTaskStore};
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{TimeZone, Utc};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn row(n: u128) -> TemplateRowId {
        TemplateRowId::from_u128(n)
    }

    fn instantiator(store: &InMemoryTaskStore) -> TemplateInstantiator {
        let calendars = CalendarProvider::new(
            CalendarSettings::default(),
            Arc::new(InMemoryHolidays::default()),
        );
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        TemplateInstantiator::new(
            Arc::new(store.clone()),
            Arc::new(calendars),
            Arc::new(UlidGenerator::new(clock)),
        )
    }

    fn template(rows: Vec<TemplateRow>) -> ScheduleTemplate {
        ScheduleTemplate {
            name: "Slab".to_string(),
            rows,
        }
    }

    #[tokio::test]
    async fn forward_pass_seeds_dates() {
        // Start Monday 3rd.
        let t = template(vec![
            TemplateRow::new(row(1), "Set out", 1.0, 2),
            TemplateRow::new(row(2), "Pour", 2.0, 1).after(row(1), DependencyType::FS, 1),
            TemplateRow::new(row(3), "Cure", 3.0, 3).after(row(2), DependencyType::FS, 2),
        ]);
        let store = InMemoryTaskStore::new();

        let report = instantiator(&store)
            .instantiate(&t, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap();

        let starts: Vec<NaiveDate> = report.tasks.iter().map(|t| t.start_date).collect();
        // Set out Mon-Tue; Pour Wed 5th; Cure Fri 7th .. Tue 11th.
        assert_eq!(starts, vec![d(3), d(5), d(7)]);
        assert_eq!(report.first_start, Some(d(3)));
        assert_eq!(report.last_end, Some(d(11)));
        assert_eq!(report.dependencies.len(), 2);
        assert!(!report.reordered);

        assert_eq!(store.all_tasks().await.len(), 3);
        assert_eq!(store.all_dependencies().await, report.dependencies);
        assert!(report.tasks.iter().all(|t| t.template_row_id.is_some()));
    }

    #[tokio::test]
    async fn start_offset_and_weekend_snap() {
        let mut first = TemplateRow::new(row(1), "Site visit", 1.0, 1);
        first.start_offset_days = 5; // Saturday 8th
        let store = InMemoryTaskStore::new();

        let report = instantiator(&store)
            .instantiate(&template(vec![first]), ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap();

        assert_eq!(report.tasks[0].start_date, d(10));
    }

    #[tokio::test]
    async fn out_of_order_rows_are_reordered_and_renumbered() {
        let t = template(vec![
            TemplateRow::new(row(1), "Frame", 1.0, 1).after(row(2), DependencyType::FS, 1),
            TemplateRow::new(row(2), "Slab", 2.0, 1),
        ]);
        let store = InMemoryTaskStore::new();

        let report = instantiator(&store)
            .instantiate(&t, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap();

        assert!(report.reordered);
        let names: Vec<&str> = report.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Slab", "Frame"]);
        assert_eq!(report.tasks[0].sequence_order, 1.0);
        assert_eq!(report.tasks[1].sequence_order, 2.0);
        assert!(report.tasks[1].start_date > report.tasks[0].start_date);
    }

    #[tokio::test]
    async fn cyclic_template_is_rejected_without_writes() {
        let t = template(vec![
            TemplateRow::new(row(1), "A", 1.0, 1).after(row(2), DependencyType::FS, 0),
            TemplateRow::new(row(2), "B", 2.0, 1).after(row(1), DependencyType::FS, 0),
        ]);
        let store = InMemoryTaskStore::new();

        let err = instantiator(&store)
            .instantiate(&t, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ScheduleError::CyclicTemplate(_)));
        assert!(store.all_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn self_reference_is_a_cycle() {
        let t = template(vec![
            TemplateRow::new(row(1), "A", 1.0, 1).after(row(1), DependencyType::SS, 0),
        ]);
        let err = instantiator(&InMemoryTaskStore::new())
            .instantiate(&t, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::CyclicTemplate(_)));
    }

    #[tokio::test]
    async fn unknown_and_duplicate_rows_are_rejected() {
        let unknown = template(vec![
            TemplateRow::new(row(1), "A", 1.0, 1).after(row(9), DependencyType::FS, 0),
        ]);
        let duplicate = template(vec![
            TemplateRow::new(row(1), "A", 1.0, 1),
            TemplateRow::new(row(1), "B", 2.0, 1),
        ]);
        let inst = instantiator(&InMemoryTaskStore::new());

        let err = inst
            .instantiate(&unknown, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownTemplateRow { .. }));

        let err = inst
            .instantiate(&duplicate, ScheduleId::from_u128(7), d(3), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateTemplateRow(_)));
    }

    #[tokio::test]
    async fn every_seeded_start_is_a_working_day() {
        let t = template(vec![
            TemplateRow::new(row(1), "A", 1.0, 4),
            TemplateRow::new(row(2), "B", 2.0, 2).after(row(1), DependencyType::FS, 1),
            TemplateRow::new(row(3), "C", 3.0, 2).after(row(1), DependencyType::SS, 5),
            TemplateRow::new(row(4), "D", 4.0, 3)
                .after(row(2), DependencyType::FF, 2)
                .after(row(3), DependencyType::SF, 0),
        ]);
        let report = instantiator(&InMemoryTaskStore::new())
            .instantiate(&t, ScheduleId::from_u128(7), d(6), None)
            .await
            .unwrap();

        let calendar = WorkingCalendar::default();
        for task in &report.tasks {
            assert!(calendar.is_working_day(task.start_date));
            assert!(task.end_date >= task.start_date);
        }
    }
}
