//! Reusable schedule templates.
//!
//! Predecessors are expressed as template-row ids; the instantiator turns them
//! into task-to-task dependencies.

use serde::{Deserialize, Serialize};

use super::dependency::DependencyType;
use super::ids::TemplateRowId;
use super::task::SpawnConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub name: String,
    pub rows: Vec<TemplateRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRow {
    pub id: TemplateRowId,
    pub name: String,
    pub sequence_order: f64,

    /// Calendar days after the schedule start before this row may begin.
    #[serde(default)]
    pub start_offset_days: i32,

    #[serde(default = "default_duration")]
    pub duration_days: u32,

    #[serde(default)]
    pub predecessors: Vec<PredecessorRef>,

    #[serde(default)]
    pub spawn: SpawnConfig,
}

fn default_duration() -> u32 {
    1
}

impl TemplateRow {
    pub fn new(id: TemplateRowId, name: impl Into<String>, sequence_order: f64, duration_days: u32) -> Self {
        Self {
            id,
            name: name.into(),
            sequence_order,
            start_offset_days: 0,
            duration_days,
            predecessors: Vec::new(),
            spawn: SpawnConfig::default(),
        }
    }

    pub fn after(mut self, row: TemplateRowId, kind: DependencyType, lag_days: i32) -> Self {
        self.predecessors.push(PredecessorRef { row, kind, lag_days });
        self
    }
}

/// Reference to another row of the same template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredecessorRef {
    pub row: TemplateRowId,

    #[serde(default, rename = "type")]
    pub kind: DependencyType,

    #[serde(default)]
    pub lag_days: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_row_defaults_from_json() {
        let json = r#"
        {
          "name": "Slab",
          "rows": [
            { "id": "00000000000000000000000001", "name": "Set out", "sequence_order": 1 },
            {
              "id": "00000000000000000000000002",
              "name": "Pour",
              "sequence_order": 2,
              "duration_days": 2,
              "predecessors": [{ "row": "00000000000000000000000001", "lag_days": 1 }]
            }
          ]
        }"#;
        let template: ScheduleTemplate = serde_json::from_str(json).unwrap();

        assert_eq!(template.rows[0].duration_days, 1);
        assert_eq!(template.rows[1].predecessors[0].kind, DependencyType::FS);
        assert_eq!(template.rows[1].predecessors[0].lag_days, 1);
    }
}
