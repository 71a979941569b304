mod input;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lotcheck_checklist::{PhotoBlob, ProcessId, SessionId};
use lotcheck_config::{ClientConfig, StoreBackend};
use lotcheck_session::{ConfirmationView, ControllerState, ExecutionController};
use lotcheck_store::{HttpRecordStore, RecordStore, SqliteRecordStore};

use crate::input::{AnswersFile, Fixture, mime_type_for, resolve_photo};

/// Lotcheck - run quality-inspection checklists against a record store
#[derive(Parser)]
#[command(name = "lotcheck")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the config file (default: <config dir>/lotcheck/config.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Use the REST API at this URL
  #[arg(long, global = true, conflicts_with = "database")]
  store_url: Option<String>,

  /// Use this SQLite database file
  #[arg(long, global = true)]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a checklist for a process sheet from an answers file
  Run {
    /// The process sheet to inspect
    #[arg(long)]
    process: i64,

    /// JSON file with the answers
    #[arg(long)]
    answers: PathBuf,

    /// Write the verdict after completing
    #[arg(long)]
    confirm: bool,
  },

  /// Show the persisted results of a session
  Show {
    #[arg(long)]
    session: i64,
  },

  /// Write the verdict of a session from its persisted results
  Confirm {
    #[arg(long)]
    session: i64,
  },

  /// Load checklists and process sheets into the SQLite store
  Seed {
    /// JSON fixture file
    #[arg(long)]
    fixture: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut config = ClientConfig::load(cli.config.as_deref()).context("failed to load config")?;
  if let Some(url) = cli.store_url {
    config.store.backend = StoreBackend::Http;
    config.store.base_url = url;
  }
  if let Some(database) = cli.database {
    config.store.backend = StoreBackend::Sqlite;
    config.store.database = database;
  }
  init_logging(&config.log.filter);

  let Some(command) = cli.command else {
    println!("lotcheck - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run {
        process,
        answers,
        confirm,
      } => run_checklist(&config, ProcessId(process), &answers, confirm).await,
      Commands::Show { session } => show_session(&config, SessionId(session)).await,
      Commands::Confirm { session } => confirm_session(&config, SessionId(session)).await,
      Commands::Seed { fixture } => seed(&config, &fixture).await,
    }
  })
}

/// Log to stderr; `RUST_LOG` overrides the configured filter.
fn init_logging(filter: &str) {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
    .with_writer(std::io::stderr)
    .init();
}

async fn open_store(config: &ClientConfig) -> Result<Arc<dyn RecordStore>> {
  match config.store.backend {
    StoreBackend::Http => {
      let store = HttpRecordStore::new(
        &config.store.base_url,
        Duration::from_secs(config.store.timeout_secs),
      )
      .context("failed to create http store")?;
      Ok(Arc::new(store))
    }
    StoreBackend::Sqlite => Ok(Arc::new(open_sqlite(&config.store.database).await?)),
  }
}

async fn open_sqlite(path: &Path) -> Result<SqliteRecordStore> {
  let url = format!("sqlite://{}", path.display());
  SqliteRecordStore::connect(&url)
    .await
    .with_context(|| format!("failed to open database: {}", path.display()))
}

async fn run_checklist(
  config: &ClientConfig,
  process_id: ProcessId,
  answers_file: &Path,
  confirm: bool,
) -> Result<()> {
  let content = tokio::fs::read_to_string(answers_file)
    .await
    .with_context(|| format!("failed to read answers file: {}", answers_file.display()))?;
  let mut answers = AnswersFile::parse(&content)?.by_item();

  let store = open_store(config).await?;
  let mut controller = ExecutionController::start(store, process_id).await;
  if let ControllerState::Failed(reason) = controller.state() {
    bail!("{}", reason);
  }

  let unknown: Vec<String> = answers
    .keys()
    .filter(|id| !controller.items().iter().any(|i| i.id == **id))
    .map(ToString::to_string)
    .collect();
  if !unknown.is_empty() {
    bail!("answers name items not in the checklist: {}", unknown.join(", "));
  }

  eprintln!(
    "Session {} started with {} items",
    controller.session_id().map(|s| s.to_string()).unwrap_or_default(),
    controller.item_count()
  );

  while let ControllerState::Active(_) = controller.state() {
    if let Some(item) = controller.current_item().cloned()
      && let Some(answer) = answers.remove(&item.id)
    {
      controller
        .set_raw_value(&answer.value)
        .with_context(|| format!("invalid value for '{}'", item.title))?;
      controller.set_comment(answer.comment)?;
      for photo in &answer.photos {
        let path = resolve_photo(answers_file, photo);
        let bytes = tokio::fs::read(&path)
          .await
          .with_context(|| format!("failed to read photo: {}", path.display()))?;
        controller.append_photo(PhotoBlob::new(bytes, mime_type_for(&path)))?;
      }
    }

    if let Err(e) = controller.next().await {
      bail!("{}", e.user_message());
    }
  }

  if let Some(warning) = controller.warning() {
    warn!(warning = %warning, "photos_incomplete");
    eprintln!("Warning: {}", warning);
  }
  eprintln!("Completed in {}", controller.elapsed_display());

  if confirm {
    let verdict = match controller.confirm().await {
      Ok(verdict) => verdict,
      Err(e) => bail!("{}", e.user_message()),
    };
    info!(verdict = %verdict, "verdict_written");
  }

  let view = controller
    .confirmation()
    .context("results were not loaded")?;
  println!("{}", serde_json::to_string_pretty(&summary(view))?);
  controller.teardown();
  Ok(())
}

async fn show_session(config: &ClientConfig, session_id: SessionId) -> Result<()> {
  let store = open_store(config).await?;
  let view = ConfirmationView::fetch(store.as_ref(), session_id)
    .await
    .with_context(|| format!("failed to load session {}", session_id))?;
  println!("{}", serde_json::to_string_pretty(&summary(&view))?);
  Ok(())
}

async fn confirm_session(config: &ClientConfig, session_id: SessionId) -> Result<()> {
  let store = open_store(config).await?;
  let view = match ConfirmationView::confirm_stored(store, session_id).await {
    Ok(view) => view,
    Err(e) => bail!("{}", e.user_message()),
  };
  println!("{}", view.verdict());
  Ok(())
}

async fn seed(config: &ClientConfig, fixture_file: &Path) -> Result<()> {
  let content = tokio::fs::read_to_string(fixture_file)
    .await
    .with_context(|| format!("failed to read fixture: {}", fixture_file.display()))?;
  let fixture = Fixture::parse(&content)?;

  let store = open_sqlite(&config.store.database).await?;
  for checklist in &fixture.checklists {
    store.insert_checklist(checklist).await?;
  }
  for process in &fixture.processes {
    store.insert_process(process).await?;
  }

  eprintln!(
    "Seeded {} checklists and {} processes into {}",
    fixture.checklists.len(),
    fixture.processes.len(),
    config.store.database.display()
  );
  Ok(())
}

fn summary(view: &ConfirmationView) -> serde_json::Value {
  json!({
    "session_id": view.session.id,
    "status": view.session.status,
    "label": view.display_label(),
    "verdict": view.verdict(),
    "counts": view.tally,
    "started_at": view.started_at(),
    "finished_at": view.finished_at(),
    "duration_minutes": view.duration_minutes(),
    "rows": view.rows,
  })
}
