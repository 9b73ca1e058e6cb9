//! JSON snapshot: the CLI's stand-in for a database.
//!
//! ```json
//! {
//!   "tasks": [...],
//!   "dependencies": [...],
//!   "holidays": { "QLD": ["2025-04-18"] },
//!   "audit": [...]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use trellis_core::domain::{Dependency, Region, RolloverLogEntry, ScheduledTask};
use trellis_core::impls::{InMemoryHolidays, InMemoryTaskStore};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tasks: Vec<ScheduledTask>,
    pub dependencies: Vec<Dependency>,
    pub holidays: BTreeMap<Region, BTreeSet<NaiveDate>>,
    pub audit: Vec<RolloverLogEntry>,
}

impl Snapshot {
    /// Missing file = empty snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading snapshot {path:?}"))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing snapshot {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("writing snapshot {path:?}"))
    }

    pub fn into_adapters(self) -> (InMemoryTaskStore, InMemoryHolidays) {
        let store = InMemoryTaskStore::with_data(self.tasks, self.dependencies, self.audit);
        (store, InMemoryHolidays::new(self.holidays))
    }

    pub async fn capture(store: &InMemoryTaskStore, holidays: &InMemoryHolidays) -> Self {
        Self {
            tasks: store.all_tasks().await,
            dependencies: store.all_dependencies().await,
            holidays: holidays.regions().clone(),
            audit: store.all_audit_entries().await,
        }
    }
}
