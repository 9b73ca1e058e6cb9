//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use trellis_core::domain::{ScheduleId, TaskId};

/// Command-line arguments for `trellis`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "trellis",
    version,
    about = "Cascade schedule dates, roll over overdue tasks and spawn follow-up work.",
    long_about = None
)]
pub struct CliArgs {
    /// JSON snapshot holding tasks, dependencies, holidays and the audit log.
    #[arg(long, value_name = "PATH", default_value = "trellis.json", global = true)]
    pub snapshot: PathBuf,

    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Save the updated snapshot back to `--snapshot`.
    #[arg(long, global = true)]
    pub write: bool,

    /// Pretend the current instant is this RFC 3339 timestamp.
    #[arg(long, value_name = "INSTANT", global = true)]
    pub now: Option<DateTime<Utc>>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TRELLIS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Propagate a task's dates to its successors.
    Cascade {
        #[arg(long, value_name = "TASK")]
        task: TaskId,

        /// Move the task to this date first (snapped to a working day).
        #[arg(long, value_name = "DATE")]
        start: Option<NaiveDate>,
    },

    /// Show what moving a task would do to its direct successors.
    Preview {
        #[arg(long, value_name = "TASK")]
        task: TaskId,

        #[arg(long, value_name = "DATE")]
        start: NaiveDate,
    },

    /// Move overdue tasks to today, right now.
    Rollover {
        /// Only roll over this schedule.
        #[arg(long, value_name = "SCHEDULE")]
        schedule: Option<ScheduleId>,
    },

    /// Create missing follow-up tasks for a task.
    Spawn {
        #[arg(long, value_name = "TASK")]
        task: TaskId,

        /// List planned follow-ups without creating them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a schedule's tasks from a JSON template.
    Instantiate {
        #[arg(long, value_name = "PATH")]
        template: PathBuf,

        #[arg(long, value_name = "SCHEDULE")]
        schedule: ScheduleId,

        #[arg(long, value_name = "DATE")]
        start: NaiveDate,

        #[arg(long, value_name = "REGION")]
        region: Option<String>,
    },

    /// Print when the next scheduled rollover would run.
    NextRun,

    /// Run scheduled rollovers until interrupted.
    Daemon,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cascade_with_prefixed_id() {
        let args = CliArgs::try_parse_from([
            "trellis",
            "cascade",
            "--task",
            "task-00000000000000000000000001",
            "--start",
            "2025-03-10",
            "--write",
        ])
        .unwrap();

        assert!(args.write);
        match args.command {
            Command::Cascade { task, start } => {
                assert_eq!(task, TaskId::from_u128(1));
                assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_task_id() {
        assert!(CliArgs::try_parse_from(["trellis", "spawn", "--task", "nope"]).is_err());
    }
}
