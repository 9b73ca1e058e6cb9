//! Working calendar: weekly pattern + regional non-working dates.
//!
//! Everything here is a pure function of its inputs. The cascade engine's
//! idempotence depends on that: the same (date, region) always answers the
//! same way within a run.
//!
//! # Day arithmetic
//! - `add_working_days(d, 0)` returns `d` when `d` is a working day,
//!   otherwise the next working day.
//! - `add_working_days(d, n)` with `n > 0` steps forward `n` working days
//!   after `d`; `d` itself does not have to be a working day.
//! - `add_working_days(d, n)` with `n < 0` steps backward `|n|` working days.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Region code used to scope public holidays (e.g. "QLD", "NSW").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which weekdays are working days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyPattern {
    working: [bool; 7],
}

impl WeeklyPattern {
    /// Builds a pattern from the listed working weekdays.
    ///
    /// Returns `None` when no weekday is a working day, since no date could
    /// ever satisfy such a calendar.
    pub fn from_working_days(days: impl IntoIterator<Item = Weekday>) -> Option<Self> {
        let mut working = [false; 7];
        for day in days {
            working[day.num_days_from_monday() as usize] = true;
        }
        working.iter().any(|w| *w).then_some(Self { working })
    }

    pub fn is_working(&self, weekday: Weekday) -> bool {
        self.working[weekday.num_days_from_monday() as usize]
    }

    pub fn working_days(&self) -> Vec<Weekday> {
        WEEK.iter().copied().filter(|d| self.is_working(*d)).collect()
    }
}

impl Default for WeeklyPattern {
    /// Monday to Friday.
    fn default() -> Self {
        Self {
            working: [true, true, true, true, true, false, false],
        }
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A weekly pattern plus a set of holidays for one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCalendar {
    pattern: WeeklyPattern,
    holidays: BTreeSet<NaiveDate>,
}

impl WorkingCalendar {
    pub fn new(pattern: WeeklyPattern, holidays: BTreeSet<NaiveDate>) -> Self {
        Self { pattern, holidays }
    }

    /// Calendar with the given pattern and no holidays.
    pub fn weekly(pattern: WeeklyPattern) -> Self {
        Self::new(pattern, BTreeSet::new())
    }

    pub fn pattern(&self) -> &WeeklyPattern {
        &self.pattern
    }

    pub fn holidays(&self) -> &BTreeSet<NaiveDate> {
        &self.holidays
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.pattern.is_working(date.weekday()) && !self.holidays.contains(&date)
    }

    /// `date` itself if it is a working day, otherwise the next one.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current) {
            current = step(current, 1);
        }
        current
    }

    pub fn add_working_days(&self, date: NaiveDate, n: i64) -> NaiveDate {
        if n == 0 {
            return self.next_working_day(date);
        }

        let direction = n.signum();
        let mut remaining = n.unsigned_abs();
        let mut current = date;
        while remaining > 0 {
            current = step(current, direction);
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// End date of a task that starts on `start` and lasts `duration_days`.
    ///
    /// Duration 0 and 1 both finish on the start day.
    pub fn end_date(&self, start: NaiveDate, duration_days: u32) -> NaiveDate {
        let offset = i64::from(duration_days.saturating_sub(1));
        if offset == 0 {
            start
        } else {
            self.add_working_days(start, offset)
        }
    }
}

fn step(date: NaiveDate, direction: i64) -> NaiveDate {
    let shifted = if direction > 0 {
        date.checked_add_days(Days::new(1))
    } else {
        date.checked_sub_days(Days::new(1))
    };
    shifted.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 2025-03-07 is a Friday.
    fn calendar_with_holiday() -> WorkingCalendar {
        WorkingCalendar::new(WeeklyPattern::default(), BTreeSet::from([d(2025, 3, 10)]))
    }

    #[rstest]
    #[case::friday(d(2025, 3, 7), true)]
    #[case::saturday(d(2025, 3, 8), false)]
    #[case::sunday(d(2025, 3, 9), false)]
    #[case::holiday_monday(d(2025, 3, 10), false)]
    #[case::tuesday(d(2025, 3, 11), true)]
    fn working_day_checks(#[case] date: NaiveDate, #[case] expected: bool) {
        assert_eq!(calendar_with_holiday().is_working_day(date), expected);
    }

    #[test]
    fn zero_days_keeps_a_working_day() {
        let cal = WorkingCalendar::default();
        assert_eq!(cal.add_working_days(d(2025, 3, 7), 0), d(2025, 3, 7));
    }

    #[test]
    fn zero_days_advances_off_a_weekend() {
        let cal = WorkingCalendar::default();
        assert_eq!(cal.add_working_days(d(2025, 3, 8), 0), d(2025, 3, 10));
    }

    #[rstest]
    #[case::over_weekend(d(2025, 3, 7), 1, d(2025, 3, 11))]
    #[case::over_weekend_and_holiday(d(2025, 3, 6), 2, d(2025, 3, 11))]
    #[case::backward(d(2025, 3, 11), -1, d(2025, 3, 7))]
    #[case::from_saturday(d(2025, 3, 8), 1, d(2025, 3, 11))]
    fn adds_working_days(#[case] from: NaiveDate, #[case] n: i64, #[case] expected: NaiveDate) {
        assert_eq!(calendar_with_holiday().add_working_days(from, n), expected);
    }

    #[test]
    fn end_date_counts_start_day() {
        let cal = WorkingCalendar::default();
        // Thursday + 3 working days span Thu, Fri, Mon.
        assert_eq!(cal.end_date(d(2025, 3, 6), 3), d(2025, 3, 10));
        assert_eq!(cal.end_date(d(2025, 3, 6), 1), d(2025, 3, 6));
        assert_eq!(cal.end_date(d(2025, 3, 6), 0), d(2025, 3, 6));
    }

    #[test]
    fn custom_pattern_with_saturdays() {
        let pattern = WeeklyPattern::from_working_days([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ])
        .unwrap();
        let cal = WorkingCalendar::weekly(pattern);
        assert!(cal.is_working_day(d(2025, 3, 8)));
        assert_eq!(cal.next_working_day(d(2025, 3, 9)), d(2025, 3, 10));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(WeeklyPattern::from_working_days(std::iter::empty()).is_none());
    }

    #[test]
    fn repeated_calls_agree() {
        let cal = calendar_with_holiday();
        let first = cal.add_working_days(d(2025, 3, 7), 5);
        let second = cal.add_working_days(d(2025, 3, 7), 5);
        assert_eq!(first, second);
    }
}
