//! Command line subcommands and their execution.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use offline_dispatch::cache::DocumentStore;
use offline_dispatch::config::Config;
use offline_dispatch::connectivity::{self, probe};
use offline_dispatch::remote::{DrainOutcome, Record};
use offline_dispatch::{Entity, HttpTransport, OfflineClient, TypeRegistry};
use serde::Serialize;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Read a single record
  Get {
    path: String,
    /// Identifier to fall back on in the cache (default: first cached record)
    #[arg(long)]
    id: Option<String>,
    #[arg(short, long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
  },
  /// Read a list of records
  List {
    path: String,
    #[arg(short, long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
  },
  /// Create a record from a JSON object
  Create {
    path: String,
    json: String,
    #[arg(short, long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
  },
  /// Update a record from a JSON object
  Update {
    path: String,
    json: String,
    #[arg(short, long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
  },
  /// Delete the record described by a JSON object
  Delete {
    path: String,
    json: String,
    #[arg(short, long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
  },
  /// Show operations waiting to be replayed
  Queue,
  /// Replay pending operations now
  Sync,
  /// Show connectivity and queue length
  Status,
}

/// Parse a `key=value` query parameter.
fn parse_query(input: &str) -> Result<(String, String), String> {
  match input.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected key=value, got '{}'", input)),
  }
}

fn parse_record(json: &str) -> Result<Record> {
  let record: Record = serde_json::from_str(json)
    .map_err(|e| eyre!("Invalid record JSON (expected an object): {}", e))?;
  // Records are cached and queued by id
  if record.entity_id().is_empty() {
    return Err(eyre!("Record needs a non-empty \"id\" field"));
  }
  Ok(record)
}

fn borrow_query(query: &[(String, String)]) -> Vec<(&str, &str)> {
  query
    .iter()
    .map(|(k, v)| (k.as_str(), v.as_str()))
    .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Build the client and execute one command.
pub async fn run<S: DocumentStore + 'static>(
  config: &Config,
  offline: bool,
  transport: HttpTransport,
  store: S,
  command: Command,
) -> Result<()> {
  let mut registry = TypeRegistry::new();
  registry.register_serde::<Record>();

  let (feed, monitor) = if offline {
    connectivity::channel(false)
  } else {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout())
      .build()?;
    let reachable = probe::check(&client, config.probe_url()).await;
    connectivity::channel(reachable)
  };
  info!(connected = monitor.is_connected_now(), "starting");

  let probe_task = if offline {
    None
  } else {
    Some(probe::spawn_probe(
      feed,
      config.probe_url().clone(),
      config.probe_interval(),
      config.request_timeout(),
    )?)
  };

  let client = OfflineClient::new(registry, transport, store, monitor)?;

  let outcome = execute(&client, command).await;

  if let Some(task) = probe_task {
    task.abort();
  }
  client.shutdown();
  outcome
}

async fn execute<S: DocumentStore + 'static>(
  client: &OfflineClient<HttpTransport, S>,
  command: Command,
) -> Result<()> {
  match command {
    Command::Get { path, id, query } => {
      let query = borrow_query(&query);
      let result = match id {
        Some(id) => client.get_by_id::<Record>(&path, &id, &query).await?,
        None => client.get::<Record>(&path, &query).await?,
      };
      print_json(&result)
    }
    Command::List { path, query } => {
      let result = client
        .get_list::<Record>(&path, &borrow_query(&query))
        .await?;
      print_json(&result)
    }
    Command::Create { path, json, query } => {
      let record = parse_record(&json)?;
      let result = client.post(&path, &record, &borrow_query(&query)).await?;
      print_json(&result)
    }
    Command::Update { path, json, query } => {
      let record = parse_record(&json)?;
      let result = client.put(&path, &record, &borrow_query(&query)).await?;
      print_json(&result)
    }
    Command::Delete { path, json, query } => {
      let record = parse_record(&json)?;
      let result = client.delete(&path, &record, &borrow_query(&query)).await?;
      print_json(&result)
    }
    Command::Queue => print_json(&client.pending_operations()?),
    Command::Sync => {
      match client.replay_now().await? {
        DrainOutcome::AlreadyDraining => println!("A replay is already running"),
        DrainOutcome::Drained { replayed } => println!("Replayed {} operation(s)", replayed),
        DrainOutcome::Halted {
          replayed,
          sequence,
          error,
        } => println!(
          "Replayed {} operation(s); stopped at #{}: {}",
          replayed, sequence, error
        ),
      }
      Ok(())
    }
    Command::Status => {
      let pending = client.pending_operations()?.len();
      println!(
        "{} | {} pending operation(s)",
        if client.is_connected() {
          "online"
        } else {
          "offline"
        },
        pending
      );
      Ok(())
    }
  }
}
