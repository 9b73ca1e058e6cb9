//! Configuration loaded from TOML.
//!
//! ```toml
//! [calendar]
//! working_days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
//! default_region = "QLD"
//!
//! [rollover]
//! enabled = true
//! timezone = "Australia/Sydney"
//! time = "00:00"
//! ```
//!
//! The raw file form ([`ConfigFile`]) only handles deserialization and
//! defaults; [`TrellisConfig`] is the validated form that the calendar
//! provider and rollover job take in their constructors.

use std::path::Path;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{Region, ScheduleError, WeeklyPattern};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Australia::Sydney;
pub const DEFAULT_ROLLOVER_TIME: &str = "00:00";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub calendar: CalendarSection,
    pub rollover: RolloverSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarSection {
    pub working_days: Vec<Weekday>,
    pub default_region: Option<Region>,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            working_days: WeeklyPattern::default().working_days(),
            default_region: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolloverSection {
    pub enabled: bool,
    pub timezone: Tz,
    /// Local time of day, "HH:MM" 24-hour.
    pub time: String,
}

impl Default for RolloverSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: DEFAULT_TIMEZONE,
            time: DEFAULT_ROLLOVER_TIME.to_string(),
        }
    }
}

/// Calendar settings shared by every region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarSettings {
    pub pattern: WeeklyPattern,
    /// Used for tasks without a region of their own.
    pub default_region: Option<Region>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverSettings {
    pub enabled: bool,
    pub timezone: Tz,
    pub time: NaiveTime,
}

impl Default for RolloverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: DEFAULT_TIMEZONE,
            time: NaiveTime::default(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrellisConfig {
    pub calendar: CalendarSettings,
    pub rollover: RolloverSettings,
}

impl TrellisConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ScheduleError> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| ScheduleError::Config(format!("parsing TOML: {e}")))?;
        Self::try_from(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScheduleError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}

impl TryFrom<ConfigFile> for TrellisConfig {
    type Error = ScheduleError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let pattern = WeeklyPattern::from_working_days(file.calendar.working_days).ok_or_else(
            || ScheduleError::Config("[calendar].working_days must list at least one day".into()),
        )?;
        let time = parse_time_of_day(&file.rollover.time)?;

        Ok(Self {
            calendar: CalendarSettings {
                pattern,
                default_region: file.calendar.default_region,
            },
            rollover: RolloverSettings {
                enabled: file.rollover.enabled,
                timezone: file.rollover.timezone,
                time,
            },
        })
    }
}

/// Parse "HH:MM" (24-hour).
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        ScheduleError::Config(format!(
            "[rollover].time must be HH:MM (24-hour), got {value:?}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use rstest::rstest;

    #[test]
    fn empty_file_uses_defaults() {
        let config = TrellisConfig::from_toml_str("").unwrap();

        assert_eq!(config, TrellisConfig::default());
        assert_eq!(config.rollover.timezone, chrono_tz::Australia::Sydney);
        assert!(config.rollover.enabled);
        assert!(!config.calendar.pattern.is_working(Weekday::Sat));
    }

    #[test]
    fn full_file_parses() {
        let config = TrellisConfig::from_toml_str(
            r#"
            [calendar]
            working_days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
            default_region = "QLD"

            [rollover]
            enabled = false
            timezone = "Australia/Brisbane"
            time = "02:30"
            "#,
        )
        .unwrap();

        assert!(config.calendar.pattern.is_working(Weekday::Sat));
        assert!(!config.calendar.pattern.is_working(Weekday::Sun));
        assert_eq!(config.calendar.default_region, Some(Region::new("QLD")));
        assert!(!config.rollover.enabled);
        assert_eq!(config.rollover.timezone, chrono_tz::Australia::Brisbane);
        assert_eq!(config.rollover.time, NaiveTime::from_hms_opt(2, 30, 0).unwrap());
    }

    #[test]
    fn empty_working_week_is_rejected() {
        let err = TrellisConfig::from_toml_str("[calendar]\nworking_days = []\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err =
            TrellisConfig::from_toml_str("[rollover]\ntimezone = \"Mars/Olympus\"\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[rstest]
    #[case("00:00", Some((0, 0)))]
    #[case("23:59", Some((23, 59)))]
    #[case("24:00", None)]
    #[case("noon", None)]
    #[case("12", None)]
    fn time_of_day_parsing(#[case] input: &str, #[case] expected: Option<(u32, u32)>) {
        let parsed = parse_time_of_day(input).ok();
        let expected = expected.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap());
        assert_eq!(parsed, expected);
    }
}
