//! Domain model (ids, tasks, dependencies, calendar, templates, audit).
//!
//! ここはすべて純粋なデータと計算だけで、I/O は ports 経由で app 層が行います。

pub mod audit;
pub mod calendar;
pub mod dependency;
pub mod errors;
pub mod graph;
pub mod ids;
pub mod state;
pub mod task;
pub mod template;

pub use audit::{RolloverFailure, RolloverLogEntry, RolloverSummary};
pub use calendar::{Region, WeeklyPattern, WorkingCalendar};
pub use dependency::{Dependency, DependencyType};
pub use errors::{ErrorKind, ScheduleError};
pub use graph::DependencyGraph;
pub use ids::{AuditEntryId, ScheduleId, TaskId, TemplateRowId};
pub use state::RolloverState;
pub use task::{LockKind, LockState, ScheduledTask, SpawnConfig, SpawnedType, TaskStatus};
pub use template::{PredecessorRef, ScheduleTemplate, TemplateRow};
