//! Command dispatch: builds the adapters from the snapshot, wires the
//! services together and runs one subcommand.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;
use trellis_core::app::{
    CalendarProvider, CascadeEngine, ChangedField, RolloverJob, RolloverLoop, RolloverScheduler,
    TaskSpawner, TemplateInstantiator, next_run_at,
};
use trellis_core::config::TrellisConfig;
use trellis_core::domain::{Region, ScheduleTemplate, TaskId};
use trellis_core::impls::{ChannelRunQueue, InMemoryHolidays, InMemoryTaskStore, RecordingRunQueue};
use trellis_core::ports::{
    AuditLog, Clock, FixedClock, HolidaySource, IdGenerator, RunQueue, SystemClock, TaskStore,
    UlidGenerator,
};

use crate::cli::{CliArgs, Command};
use crate::snapshot::Snapshot;

struct Services {
    store: InMemoryTaskStore,
    holidays: Arc<InMemoryHolidays>,
    config: TrellisConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    calendars: Arc<CalendarProvider>,
    cascade: Arc<CascadeEngine>,
}

impl Services {
    fn build(args: &CliArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => TrellisConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TrellisConfig::default(),
        };

        let snapshot = Snapshot::load(&args.snapshot)?;
        let (store, holidays) = snapshot.into_adapters();
        let holidays = Arc::new(holidays);

        let (clock, ids): (Arc<dyn Clock>, Arc<dyn IdGenerator>) = match args.now {
            Some(at) => {
                let clock = FixedClock::new(at);
                (Arc::new(clock), Arc::new(UlidGenerator::new(clock)))
            }
            None => (Arc::new(SystemClock), Arc::new(UlidGenerator::new(SystemClock))),
        };

        let source: Arc<dyn HolidaySource> = holidays.clone();
        let calendars = Arc::new(CalendarProvider::new(config.calendar.clone(), source));
        let cascade = Arc::new(CascadeEngine::new(
            Arc::new(store.clone()),
            calendars.clone(),
        ));

        Ok(Self {
            store,
            holidays,
            config,
            clock,
            ids,
            calendars,
            cascade,
        })
    }

    fn task_store(&self) -> Arc<dyn TaskStore> {
        Arc::new(self.store.clone())
    }

    fn scheduler(&self, queue: Arc<dyn RunQueue>) -> RolloverScheduler {
        let audit: Arc<dyn AuditLog> = Arc::new(self.store.clone());
        let job = RolloverJob::new(
            self.task_store(),
            audit,
            self.calendars.clone(),
            self.cascade.clone(),
            self.clock.clone(),
            self.ids.clone(),
            self.config.rollover.timezone,
        );
        RolloverScheduler::new(
            Arc::new(job),
            queue,
            self.clock.clone(),
            self.config.rollover,
        )
    }

    async fn save(&self, args: &CliArgs) -> Result<()> {
        if !args.write {
            return Ok(());
        }
        Snapshot::capture(&self.store, &self.holidays)
            .await
            .save(&args.snapshot)?;
        info!(path = %args.snapshot.display(), "snapshot written");
        Ok(())
    }
}

/// Entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let services = Services::build(&args)?;

    match &args.command {
        Command::Cascade { task, start } => {
            if let Some(start) = start {
                move_root(&services, *task, *start).await?;
            }
            let report = services
                .cascade
                .cascade(*task, &[ChangedField::StartDate])
                .await?;
            print_json(&report)?;
        }
        Command::Preview { task, start } => {
            let preview = services.cascade.preview(*task, *start).await?;
            print_json(&preview)?;
        }
        Command::Rollover { schedule } => {
            let scheduler = services.scheduler(Arc::new(RecordingRunQueue::new()));
            let summary = scheduler.run_now(*schedule).await?;
            print_json(&summary)?;
        }
        Command::Spawn { task, dry_run } => {
            let spawner = TaskSpawner::new(
                services.task_store(),
                services.calendars.clone(),
                services.ids.clone(),
            );
            if *dry_run {
                print_json(&spawner.preview(*task).await?)?;
            } else {
                print_json(&spawner.spawn_all(*task).await?)?;
            }
        }
        Command::Instantiate {
            template,
            schedule,
            start,
            region,
        } => {
            let contents = std::fs::read_to_string(template)
                .with_context(|| format!("reading template {}", template.display()))?;
            let parsed: ScheduleTemplate = serde_json::from_str(&contents)
                .with_context(|| format!("parsing template {}", template.display()))?;
            let instantiator = TemplateInstantiator::new(
                services.task_store(),
                services.calendars.clone(),
                services.ids.clone(),
            );
            let report = instantiator
                .instantiate(&parsed, *schedule, *start, region.clone().map(Region::new))
                .await?;
            print_json(&report)?;
        }
        Command::NextRun => {
            let rollover = &services.config.rollover;
            print_json(&NextRun {
                enabled: rollover.enabled,
                timezone: rollover.timezone.name(),
                next_run_at: next_run_at(services.clock.now(), rollover.time, rollover.timezone),
            })?;
        }
        Command::Daemon => daemon(&services).await?,
    }

    services.save(&args).await
}

/// Put the root on `start` (snapped forward to a working day) before cascading.
async fn move_root(services: &Services, id: TaskId, start: chrono::NaiveDate) -> Result<()> {
    let Some(task) = services.store.get_task(id).await? else {
        bail!("task {id} not found");
    };
    if let Some(lock) = task.lock_kind() {
        bail!("task {id} is locked ({}); unlock it before moving", lock.as_str());
    }

    let calendar = services.calendars.calendar_for(task.region.as_ref()).await;
    let start = calendar.next_working_day(start);
    let end = calendar.end_date(start, task.duration_days);
    services.store.update_dates(id, start, end).await?;
    info!(task = %id, %start, %end, "root task moved");
    Ok(())
}

async fn daemon(services: &Services) -> Result<()> {
    let (queue, runs) = ChannelRunQueue::new();
    let scheduler = Arc::new(services.scheduler(Arc::new(queue)));

    let rollover_loop = RolloverLoop::spawn(scheduler.clone(), runs);
    if scheduler.start().await?.is_none() {
        info!("rollover disabled in config; waiting for Ctrl-C");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");
    rollover_loop.shutdown_and_join().await;
    Ok(())
}

#[derive(Serialize)]
struct NextRun {
    enabled: bool,
    timezone: &'static str,
    next_run_at: chrono::DateTime<chrono::Utc>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
