//! Diagnostic CLI for the reminder core.
//!
//! # Responsibility
//! - Verify `reminder_core` linkage and inspect the persisted record list.
//! - Run the snooze flow end to end against the in-process scheduler.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use reminder_core::{
    ActionId, Category, Clock, InMemoryKeyValueStore, InMemoryScheduler, LifecycleConfig, ManualClock,
    NotificationEvent, NotificationForm, NotificationKind, NotificationLifecycleManager,
    RepeatPolicy, ScheduleRequest, SqliteKeyValueStore, SystemClock,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_DB_FILE_NAME: &str = "reminder_records.sqlite3";

#[derive(Parser)]
#[command(name = "reminder-cli")]
#[command(about = "Inspect and exercise the reminder core")]
struct Cli {
    /// Record database (defaults to $REMINDER_DB_PATH, then the temp dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core ping and version
    Ping,

    /// List persisted records in stored order
    List,

    /// Create a record and schedule it on the in-process scheduler
    Add {
        title: String,
        message: String,
        /// Minutes from now until delivery
        #[arg(long, default_value_t = 60)]
        in_minutes: i64,
        #[arg(long, value_enum, default_value_t = KindArg::Reminder)]
        kind: KindArg,
        #[arg(long, value_enum, default_value_t = RepeatArg::None)]
        repeat: RepeatArg,
    },

    /// Remove the record at a list position (scheduled entry is kept)
    Delete { index: usize },

    /// Deliver a reminder, snooze it five minutes later, print the result
    Demo,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Reminder,
    Task,
}

impl From<KindArg> for NotificationKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Reminder => Self::Reminder,
            KindArg::Task => Self::Task,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    None,
    Daily,
    Weekly,
}

impl From<RepeatArg> for RepeatPolicy {
    fn from(value: RepeatArg) -> Self {
        match value {
            RepeatArg::None => Self::None,
            RepeatArg::Daily => Self::Daily,
            RepeatArg::Weekly => Self::Weekly,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let log_dir = log_dir.to_str().ok_or("log dir must be valid UTF-8")?;
        reminder_core::init_logging(reminder_core::default_log_level(), log_dir)?;
    }

    match cli.command.unwrap_or(Commands::Ping) {
        Commands::Ping => {
            println!("reminder_core ping={}", reminder_core::ping());
            println!("reminder_core version={}", reminder_core::core_version());
        }
        Commands::List => {
            let manager = open_manager(cli.db)?;
            let records = manager.list_indexed_records().await;
            if records.is_empty() {
                println!("no records");
            }
            for (index, record) in &records {
                println!(
                    "{index}\t{}\t{}\t{:?}\t{}\t{}",
                    record.scheduled_at.to_rfc3339(),
                    record.kind.as_str(),
                    record.repeat_policy,
                    record.id,
                    record.title
                );
            }
        }
        Commands::Add {
            title,
            message,
            in_minutes,
            kind,
            repeat,
        } => {
            let manager = open_manager(cli.db)?;
            let submission = manager
                .create_from_form(NotificationForm {
                    title,
                    message,
                    date: Utc::now() + Duration::minutes(in_minutes),
                    category: Category::General,
                    repeat: repeat.into(),
                    kind: kind.into(),
                })
                .await?;
            println!(
                "added id={} outcome={:?} persisted={}",
                submission.record.id, submission.outcome, submission.persisted
            );
        }
        Commands::Delete { index } => {
            let manager = open_manager(cli.db)?;
            match manager.delete_record(index).await {
                Some(removed) => println!(
                    "deleted id={} title={}",
                    removed.id().unwrap_or_default(),
                    removed.title().unwrap_or_default()
                ),
                None => println!("no record at position {index}"),
            }
        }
        Commands::Demo => run_demo().await?,
    }
    Ok(())
}

fn open_manager(
    db: Option<PathBuf>,
) -> Result<NotificationLifecycleManager<InMemoryScheduler, SqliteKeyValueStore>, Box<dyn Error>> {
    let store = SqliteKeyValueStore::open(resolve_db_path(db))?;
    Ok(NotificationLifecycleManager::new(
        Arc::new(InMemoryScheduler::new()),
        Arc::new(store),
        Arc::new(SystemClock),
        LifecycleConfig::default(),
    ))
}

fn resolve_db_path(db: Option<PathBuf>) -> PathBuf {
    if let Some(path) = db {
        return path;
    }
    if let Ok(raw) = std::env::var("REMINDER_DB_PATH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

async fn run_demo() -> Result<(), Box<dyn Error>> {
    let scheduler = Arc::new(InMemoryScheduler::new());
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let manager = NotificationLifecycleManager::start(
        Arc::clone(&scheduler),
        Arc::new(InMemoryKeyValueStore::new()),
        clock.clone(),
        LifecycleConfig::default(),
    )
    .await?;

    let request = ScheduleRequest::new(
        "demo-1",
        "Pay rent",
        "Due today",
        start,
        NotificationKind::Reminder,
    );
    let outcome = manager.schedule_notification(&request).await?;
    println!("scheduled id={} at={} outcome={outcome:?}", request.id, start.to_rfc3339());

    for delivered in scheduler.deliver_due(start) {
        clock.advance(Duration::minutes(5));
        let action = manager
            .handle_event(&NotificationEvent::press(delivered, Some(ActionId::Snooze)))
            .await?;
        println!("pressed snooze at={} outcome={action:?}", clock.now().to_rfc3339());
    }

    for id in scheduler.live_ids() {
        if let Some(entry) = scheduler.live_entry(&id) {
            let at = entry
                .trigger
                .map_or_else(|| "displayed".to_string(), |trigger| trigger.timestamp.to_rfc3339());
            println!(
                "live id={id} title={} state={:?} at={at}",
                entry.payload.title, entry.state
            );
        }
    }
    Ok(())
}
