mod commands;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use offline_dispatch::config::Config;
use offline_dispatch::{HttpTransport, MemoryStore, SqliteStore};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "offline-dispatch")]
#[command(about = "Offline-first access to a REST resource endpoint")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offline-dispatch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep cache and queue in memory only
  #[arg(long)]
  ephemeral: bool,

  /// Start disconnected and never probe the network
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config)?;

  let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout())
    .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

  if args.ephemeral {
    commands::run(&config, args.offline, transport, MemoryStore::new(), args.command).await
  } else {
    let path = config.store_path()?;
    let store = SqliteStore::open(&path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;
    commands::run(&config, args.offline, transport, store, args.command).await
  }
}

/// Log to a daily file under the data dir; stdout is reserved for results.
fn init_logging(config: &Config) -> Result<WorkerGuard> {
  let log_dir = config.log_dir()?;
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "offline-dispatch.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = match EnvFilter::try_from_default_env() {
    Ok(filter) => filter,
    Err(_) => EnvFilter::try_new(&config.log_filter)?,
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
