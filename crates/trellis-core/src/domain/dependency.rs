//! Predecessor -> successor edges.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::task::ScheduledTask;

/// Dependency type between two tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    /// Finish-to-Start.
    #[default]
    FS,
    /// Start-to-Start.
    SS,
    /// Finish-to-Finish.
    FF,
    /// Start-to-Finish.
    SF,
}

impl DependencyType {
    /// Earliest start this edge allows for a successor of `successor_duration`
    /// days, given the predecessor's dates. Calendar-day arithmetic; the caller
    /// snaps the result onto a working day.
    pub fn constraint_date(
        self,
        predecessor_start: NaiveDate,
        predecessor_end: NaiveDate,
        lag_days: i32,
        successor_duration: u32,
    ) -> NaiveDate {
        match self {
            DependencyType::FS => shift(predecessor_end, i64::from(lag_days)),
            DependencyType::SS => shift(predecessor_start, i64::from(lag_days)),
            DependencyType::FF => shift(
                predecessor_end,
                i64::from(lag_days) - i64::from(successor_duration),
            ),
            DependencyType::SF => shift(predecessor_start, i64::from(lag_days)),
        }
    }
}

/// Shift `date` by a signed number of calendar days, saturating at the
/// representable range.
pub(crate) fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

/// Directed relation predecessor -> successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor: TaskId,
    pub successor: TaskId,

    #[serde(default, rename = "type")]
    pub kind: DependencyType,

    /// Signed lag in calendar days.
    #[serde(default)]
    pub lag_days: i32,

    /// Inactive edges are kept for history but ignored by scheduling.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Dependency {
    pub fn new(predecessor: TaskId, successor: TaskId, kind: DependencyType, lag_days: i32) -> Self {
        Self {
            predecessor,
            successor,
            kind,
            lag_days,
            active: true,
        }
    }

    /// Finish-to-Start with zero lag.
    pub fn finish_to_start(predecessor: TaskId, successor: TaskId) -> Self {
        Self::new(predecessor, successor, DependencyType::FS, 0)
    }

    /// Constraint this edge puts on `successor` given the current `predecessor`.
    pub fn constraint_for(&self, predecessor: &ScheduledTask, successor: &ScheduledTask) -> NaiveDate {
        self.kind.constraint_date(
            predecessor.start_date,
            predecessor.end_date,
            self.lag_days,
            successor.duration_days,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[rstest]
    #[case::fs(DependencyType::FS, 2, d(12))]
    #[case::ss(DependencyType::SS, 2, d(5))]
    #[case::ff(DependencyType::FF, 2, d(9))]
    #[case::sf(DependencyType::SF, 2, d(5))]
    #[case::fs_negative_lag(DependencyType::FS, -3, d(7))]
    fn constraint_dates(#[case] kind: DependencyType, #[case] lag: i32, #[case] expected: NaiveDate) {
        // predecessor runs 3rd..10th, successor lasts 3 days
        assert_eq!(kind.constraint_date(d(3), d(10), lag, 3), expected);
    }

    #[test]
    fn shift_clamps_at_date_range() {
        assert_eq!(shift(NaiveDate::MAX, 1), NaiveDate::MAX);
        assert_eq!(shift(NaiveDate::MIN, -1), NaiveDate::MIN);
        // A huge lag never falls back onto the predecessor's own date.
        let near_end = NaiveDate::MAX - Days::new(2);
        assert_eq!(DependencyType::FS.constraint_date(near_end, near_end, 30, 1), NaiveDate::MAX);
    }

    #[test]
    fn serde_uses_type_key_and_defaults() {
        let json = r#"{
            "predecessor": "00000000000000000000000001",
            "successor": "00000000000000000000000002",
            "type": "SS"
        }"#;
        let dep: Dependency = serde_json::from_str(json).unwrap();
        assert_eq!(dep.kind, DependencyType::SS);
        assert_eq!(dep.lag_days, 0);
        assert!(dep.active);
    }
}
