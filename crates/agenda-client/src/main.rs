//! `agenda`: command-line front end for the agenda event service.
//!
//! # Usage
//!
//! ```text
//! agenda --url http://localhost:8080 --token secret --org acme list
//! agenda --config ~/.config/agenda/config.toml move <id> --start 2024-03-15T14:00 --end 2024-03-15T15:00
//! agenda bulk-delete month --year 2024 --month 3
//! agenda watch
//! ```

use std::{
  io::{self, BufRead, Write},
  path::PathBuf,
  time::Duration,
};

use agenda_client::{ApiConfig, DEFAULT_TIMEOUT, HttpRemote};
use agenda_core::{
  bulk::{BulkDeleteParams, BulkDeleteScope},
  controller::CalendarController,
  model::{Credentials, Event, EventDraft, EventId, NotificationLead},
  notify::{NotificationScheduler, Notifier, SCAN_INTERVAL, Severity},
  store::EventStore,
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type Controller = CalendarController<HttpRemote, TerminalNotifier>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "agenda", about = "Command-line client for the agenda event service")]
struct Args {
  /// Path to a TOML config file (url, token, org, timeout_secs,
  /// scan_interval_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the agenda server (default: http://localhost:8080).
  #[arg(long, env = "AGENDA_URL")]
  url: Option<String>,

  /// Bearer token.
  #[arg(long, env = "AGENDA_TOKEN")]
  token: Option<String>,

  /// Organization id.
  #[arg(long, env = "AGENDA_ORG")]
  org: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the organization's events.
  List {
    /// Only events assigned to this member.
    #[arg(long)]
    assignee: Option<String>,
  },
  /// Create an event.
  Create {
    #[arg(long)]
    title:        String,
    #[arg(long, value_parser = parse_datetime)]
    start:        NaiveDateTime,
    #[arg(long, value_parser = parse_datetime)]
    end:          NaiveDateTime,
    #[arg(long)]
    description:  Option<String>,
    #[arg(long, default_value = "")]
    color:        String,
    /// Reminder lead: none, 15m, 1h or 1d.
    #[arg(long, default_value = "none")]
    notification: NotificationLead,
    #[arg(long)]
    assignee:     Option<String>,
  },
  /// Move an event to a new time range.
  Move {
    id:    String,
    #[arg(long, value_parser = parse_datetime)]
    start: NaiveDateTime,
    #[arg(long, value_parser = parse_datetime)]
    end:   NaiveDateTime,
  },
  /// Change an event's end (and optionally start).
  Resize {
    id:    String,
    #[arg(long, value_parser = parse_datetime)]
    end:   NaiveDateTime,
    #[arg(long, value_parser = parse_datetime)]
    start: Option<NaiveDateTime>,
  },
  /// Delete one event.
  Delete { id: String },
  /// Delete every event in a day, range of days, month, year, or all.
  BulkDelete {
    /// day, month, year or all.
    scope: BulkDeleteScope,
    /// First day (day scope).
    #[arg(long)]
    date:  Option<NaiveDate>,
    /// Last day of a range (day scope).
    #[arg(long)]
    until: Option<NaiveDate>,
    #[arg(long)]
    year:  Option<i32>,
    #[arg(long)]
    month: Option<u32>,
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes:   bool,
  },
  /// Raise reminder alerts until interrupted.
  Watch {
    #[arg(long)]
    assignee: Option<String>,
  },
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
  ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got {raw:?}"))
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url:                String,
  #[serde(default)]
  token:              String,
  #[serde(default)]
  org:                String,
  timeout_secs:       Option<u64>,
  scan_interval_secs: Option<u64>,
}

/// Resolved settings: CLI flags (or their env vars) over the file over
/// defaults.
#[derive(Debug)]
struct Settings {
  api:           ApiConfig,
  creds:         Credentials,
  scan_interval: Duration,
}

fn pick(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_string()))
}

fn resolve(args: &Args, file: ConfigFile) -> Settings {
  let base_url =
    pick(args.url.clone(), &file.url).unwrap_or_else(|| "http://localhost:8080".to_string());
  Settings {
    api:           ApiConfig {
      base_url,
      timeout: file.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs),
    },
    creds:         Credentials::new(
      pick(args.token.clone(), &file.token).unwrap_or_default(),
      pick(args.org.clone(), &file.org).unwrap_or_default(),
    ),
    scan_interval: file.scan_interval_secs.map_or(SCAN_INTERVAL, Duration::from_secs),
  }
}

// ─── Toasts ───────────────────────────────────────────────────────────────────

/// Prints notifications to stderr.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
  fn notify(&self, message: &str, severity: Severity) {
    let tag = match severity {
      Severity::Info => "info",
      Severity::Success => "ok",
      Severity::Warning => "aviso",
      Severity::Error => "erro",
    };
    eprintln!("[{tag}] {message}");
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };
  let settings = resolve(&args, file_cfg);

  let remote = HttpRemote::new(settings.api)?;
  let controller = CalendarController::new(EventStore::new(remote), TerminalNotifier);
  let creds = &settings.creds;

  // The controller has already reported any error it returns.
  match args.command {
    Command::List { assignee } => {
      controller.refresh(creds).await?;
      for event in controller.render(&creds.org_id, assignee.as_deref()) {
        print_event(&event);
      }
    }
    Command::Create { title, start, end, description, color, notification, assignee } => {
      let draft = EventDraft {
        description,
        color,
        notification,
        assignee_id: assignee,
        ..EventDraft::new(title, start, end)
      };
      print_event(&controller.create_event(creds, &draft).await?);
    }
    Command::Move { id, start, end } => {
      controller.refresh(creds).await?;
      print_event(&controller.on_drop(creds, &EventId::new(id), start, end).await?);
    }
    Command::Resize { id, end, start } => {
      controller.refresh(creds).await?;
      let id = EventId::new(id);
      let start = match start {
        Some(start) => start,
        None => {
          controller
            .store()
            .get(&creds.org_id, &id)
            .with_context(|| format!("event {id} not found"))?
            .start_at
        }
      };
      print_event(&controller.on_resize(creds, &id, start, end).await?);
    }
    Command::Delete { id } => {
      controller.delete_event(creds, &EventId::new(id)).await?;
    }
    Command::BulkDelete { scope, date, until, year, month, yes } => {
      let params = BulkDeleteParams { start_date: date, end_date: until, year, month };
      let prepared = controller.prepare_bulk_delete(scope, &params)?;
      if !yes && !confirm(&prepared.message)? {
        eprintln!("Cancelado.");
        return Ok(());
      }
      let remaining = controller.bulk_delete(creds, prepared).await?;
      println!("{} evento(s) restantes.", remaining.len());
    }
    Command::Watch { assignee } => {
      watch_reminders(&controller, creds, settings.scan_interval, assignee.as_deref()).await?;
    }
  }

  Ok(())
}

fn print_event(event: &Event) {
  println!(
    "{}  {} → {}  {}{}",
    event.id,
    event.start_at.format("%d/%m/%Y %H:%M"),
    event.end_at.format("%H:%M"),
    event.title,
    event
      .assignee_id
      .as_deref()
      .map(|a| format!("  @{a}"))
      .unwrap_or_default(),
  );
}

/// Ask on stdin; only an explicit yes proceeds.
fn confirm(message: &str) -> Result<bool> {
  print!("{message} [s/N] ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line).context("reading confirmation")?;
  Ok(matches!(line.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes"))
}

// ─── Watch ────────────────────────────────────────────────────────────────────

async fn watch_reminders(
  controller: &Controller,
  creds: &Credentials,
  scan_interval: Duration,
  assignee: Option<&str>,
) -> Result<()> {
  controller.refresh(creds).await?;

  let (shutdown, rx) = watch::channel(false);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      let _ = shutdown.send(true);
    }
  });

  let scheduler = NotificationScheduler::new(scan_interval);
  tracing::info!(org = %creds.org_id, every = ?scan_interval, "watching for reminders");
  tokio::select! {
    () = scheduler.run(|| controller.render(&creds.org_id, assignee), &TerminalNotifier, rx) => {}
    () = keep_fresh(controller, creds, scan_interval) => {}
  }
  Ok(())
}

/// Refetch whenever the cached list has gone stale.
async fn keep_fresh(controller: &Controller, creds: &Credentials, every: Duration) {
  let mut ticker = tokio::time::interval(every);
  loop {
    ticker.tick().await;
    if let Err(e) = controller.store().ensure_fresh(creds).await {
      tracing::warn!(error = %e, "refresh failed");
    }
  }
}
