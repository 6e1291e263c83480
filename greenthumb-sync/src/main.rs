//! `greenthumb` — command-line client for the GreenThumb calendar API.
//!
//! Every command prints JSON on stdout; logs go to stderr (or `--log-file`).
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/greenthumb/config.toml`).
//!
//! ```bash
//! greenthumb list
//! greenthumb create "Water rice field" --type watering --date 2025-11-01
//! greenthumb toggle 3
//! greenthumb upcoming --days 14
//! greenthumb templates apply rice_monsoon --start 2025-06-15
//!
//! # Follow live changes until Ctrl-C
//! GREENTHUMB_URL=http://farm.local:8000 greenthumb watch
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use greenthumb_proto::notification::NotificationSettings;
use greenthumb_proto::task::{NewTask, TaskId, TaskPatch};
use greenthumb_sync::api::ApiError;
use greenthumb_sync::channel::ChannelEvent;
use greenthumb_sync::client::{DEFAULT_UPCOMING_DAYS, TaskSyncClient};
use greenthumb_sync::config::{CliArgs, ClientConfig, ConfigError};
use greenthumb_sync::notify::{Notification, Notifier, WriterSink};

#[derive(Parser, Debug)]
#[command(name = "greenthumb", version, about = "GreenThumb calendar task client")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every task.
    List,
    /// Show one task.
    Get { id: TaskId },
    /// Create a task.
    Create {
        title: String,
        /// Task category (watering, fertilizing, pruning, harvesting, ...).
        #[arg(long = "type")]
        kind: String,
        /// Scheduled day, `YYYY-MM-DD`.
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        description: Option<String>,
        /// low, medium or high (server default: medium).
        #[arg(long)]
        priority: Option<String>,
    },
    /// Change some fields of a task.
    Update {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Flip a task's completed flag.
    Toggle { id: TaskId },
    /// Delete a task.
    Delete { id: TaskId },
    /// Tasks due within the next few days.
    Upcoming {
        #[arg(long, default_value_t = DEFAULT_UPCOMING_DAYS)]
        days: u32,
    },
    /// Follow the push channel and print events until Ctrl-C.
    Watch {
        /// Do not render notifications for task events.
        #[arg(long)]
        quiet: bool,
    },
    /// Stored notifications and notification settings.
    Notifications {
        #[command(subcommand)]
        action: NotificationsCommand,
    },
    /// Crop task templates.
    Templates {
        #[command(subcommand)]
        action: TemplatesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TemplatesCommand {
    /// List templates, optionally for one crop or one season.
    List {
        #[arg(long, conflicts_with = "season")]
        crop: Option<String>,
        #[arg(long)]
        season: Option<String>,
    },
    /// Templates grouped by season.
    Categories,
    /// Show one template.
    Show { id: String },
    /// Create the template's tasks, offset from `--start` (server's today
    /// when omitted), and print the refreshed task list.
    Apply {
        id: String,
        #[arg(long)]
        start: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum NotificationsCommand {
    /// List notifications with the unread count.
    List,
    /// Mark one notification as read.
    Read { id: String },
    /// Mark every notification as read.
    ReadAll,
    /// Delete one notification.
    Delete { id: String },
    /// Ask the server to scan tasks for reminders now.
    Check,
    /// Show settings, or replace them with `--set '<json>'`.
    Settings {
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.args.log_level, cli.args.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(err = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for file logging that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = file_path.and_then(|path| {
        let name = path.file_name()?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Some((dir, name))
    });

    match file {
        Some((dir, name)) => {
            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_env_filter(env_filter)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_env_filter(env_filter)
                .init();
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::load(&cli.args)?;
    tracing::debug!(base_url = %config.base_url, ws_url = %config.ws_url, "configuration resolved");
    let client = TaskSyncClient::from_config(&config)?;

    match cli.command {
        Command::List => print_json(&client.list().await?),
        Command::Get { id } => print_json(&client.get(&id).await?),
        Command::Create {
            title,
            kind,
            date,
            description,
            priority,
        } => {
            let mut new = NewTask::new(title, kind, date);
            if let Some(description) = description {
                new = new.with_description(description);
            }
            if let Some(priority) = priority {
                new = new.with_priority(priority);
            }
            print_json(&client.create(&new).await?)
        }
        Command::Update {
            id,
            title,
            kind,
            date,
            completed,
            description,
            priority,
        } => {
            let patch = TaskPatch {
                title,
                kind: kind.map(Into::into),
                date,
                completed,
                description,
                priority: priority.map(Into::into),
            };
            print_json(&client.update(&id, &patch).await?)
        }
        Command::Toggle { id } => {
            // The optimistic flip works on the cached copy.
            client.get(&id).await?;
            print_json(&client.toggle_completed(&id).await?)
        }
        Command::Delete { id } => {
            client.delete(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
        Command::Upcoming { days } => print_json(&client.list_upcoming(days).await?),
        Command::Watch { quiet } => watch(&client, quiet).await,
        Command::Notifications { action } => notifications(&client, action).await,
        Command::Templates { action } => templates(&client, action).await,
    }
}

async fn templates(client: &TaskSyncClient, action: TemplatesCommand) -> Result<(), CliError> {
    let api = client.templates();
    match action {
        TemplatesCommand::List {
            crop: Some(crop), ..
        } => print_json(&api.by_crop(&crop).await?),
        TemplatesCommand::List {
            season: Some(season),
            ..
        } => print_json(&api.by_season(&season).await?),
        TemplatesCommand::List { .. } => print_json(&api.list().await?),
        TemplatesCommand::Categories => print_json(&api.categories().await?),
        TemplatesCommand::Show { id } => print_json(&api.get(&id).await?),
        TemplatesCommand::Apply { id, start } => {
            let applied = client.apply_template(&id, start).await?;
            print_json(&json!({ "applied": applied, "tasks": client.tasks() }))
        }
    }
}

async fn notifications(client: &TaskSyncClient, action: NotificationsCommand) -> Result<(), CliError> {
    let api = client.notifications();
    match action {
        NotificationsCommand::List => print_json(&api.list().await?),
        NotificationsCommand::Read { id } => {
            api.mark_read(&id).await?;
            print_json(&json!({ "read": id }))
        }
        NotificationsCommand::ReadAll => {
            api.mark_all_read().await?;
            print_json(&json!({ "status": "ok" }))
        }
        NotificationsCommand::Delete { id } => {
            api.delete(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
        NotificationsCommand::Check => {
            api.check().await?;
            print_json(&json!({ "status": "ok" }))
        }
        NotificationsCommand::Settings { set: Some(raw) } => {
            let settings: NotificationSettings = serde_json::from_str(&raw)?;
            api.update_settings(&settings).await?;
            print_json(&settings)
        }
        NotificationsCommand::Settings { set: None } => print_json(&api.settings().await?),
    }
}

/// Load the task list, open the push channel, and print every channel event
/// as a JSON line until Ctrl-C or until the channel gives up.
async fn watch(client: &TaskSyncClient, quiet: bool) -> Result<(), CliError> {
    let mut events = client.subscribe();
    let tasks = client.list().await?;
    print_json_line(&json!({ "event": "snapshot", "tasks": tasks }))?;

    let mut notifier = Notifier::new(WriterSink::new(io::stderr()));
    if !quiet {
        notifier.request_permission();
    }

    client.connect();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("interrupted, closing push channel");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    print_json_line(&event_json(&event))?;
                    match &event {
                        ChannelEvent::Task(task_event) => {
                            notifier.notify(&Notification::for_event(task_event));
                        }
                        ChannelEvent::GaveUp { .. } => break,
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch output fell behind, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.disconnect();
    Ok(())
}

fn event_json(event: &ChannelEvent) -> serde_json::Value {
    match event {
        ChannelEvent::StateChanged(state) => json!({ "event": "state", "state": state.to_string() }),
        ChannelEvent::Opened => json!({ "event": "opened" }),
        ChannelEvent::Closed { reason } => json!({ "event": "closed", "reason": reason }),
        ChannelEvent::Error(e) => json!({ "event": "error", "message": e.to_string() }),
        ChannelEvent::Task(task_event) => json!({ "event": "task", "payload": task_event }),
        ChannelEvent::Unrecognized { kind } => json!({ "event": "unrecognized", "type": kind }),
        ChannelEvent::Malformed(e) => json!({ "event": "malformed", "message": e.to_string() }),
        ChannelEvent::ReconnectScheduled { attempt, delay } => json!({
            "event": "reconnect_scheduled",
            "attempt": attempt,
            "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }),
        ChannelEvent::GaveUp { attempts } => json!({ "event": "gave_up", "attempts": attempts }),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// One compact JSON document per line, flushed so followers see it at once.
fn print_json_line<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    write_json_line(&mut io::stdout().lock(), value)
}

fn write_json_line<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
