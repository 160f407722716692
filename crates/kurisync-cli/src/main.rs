//! CLI for `KuriSync`: back up and restore Trickcal board progress.
//!
//! ```bash
//! kurisync config --interval 300 --auto --online --store-id <PANTRY_ID>
//! kurisync sync-now
//! kurisync pull
//! kurisync stats --layer 2
//! kurisync watch
//! ```

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use kurisync_core::{
  AppConfig, ConfigUpdate, LayerStatsService, Outcome, SyncEngine, SyncEventHandler, SyncStatus,
  SyncTarget, open_stores
};
use kurisync_remote::{HttpBoardSource, PantryConnector};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type Engine = Arc<SyncEngine<PantryConnector>>;

/// `KuriSync`: local and online backups of Trickcal board progress.
#[derive(Parser)]
#[command(name = "kurisync", version, about)]
struct Cli {
  /// Verbose output (repeatable: -v, -vv).
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// JSON config file.
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Data directory (overrides the config file).
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Command.
  #[command(subcommand)]
  command: Commands
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
  /// Capture the tracked keys into the local snapshot.
  SyncLocal,
  /// Replace the online basket with the tracked keys.
  Push,
  /// Local sync, then push (requires a store ID).
  Sync,
  /// Local sync, then push if online sync is on and a store ID is set.
  SyncNow,
  /// Overwrite the tracked keys with the online basket.
  Pull,
  /// Overwrite the tracked keys with the local snapshot.
  Restore,
  /// Write the local snapshot to a backup file.
  Export {
    /// Target directory.
    #[arg(long, default_value = ".")]
    out: PathBuf
  },
  /// Restore from a backup file.
  Import {
    /// Backup file.
    file: PathBuf
  },
  /// Change sync settings.
  Config {
    /// Auto-sync interval (seconds).
    #[arg(long)]
    interval: u64,
    /// Enable auto-sync.
    #[arg(long)]
    auto: bool,
    /// Push online on each auto-sync.
    #[arg(long)]
    online: bool,
    /// Pantry ID (empty string clears it; omitted keeps the current one).
    #[arg(long)]
    store_id: Option<String>
  },
  /// Show sync settings and last sync time.
  Status,
  /// Show bonus stats of a board layer.
  Stats {
    /// Layer number.
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    layer: u32
  },
  /// Run auto-sync until Ctrl-C.
  Watch,
  /// Show the Pantry store details.
  RemoteInfo,
  /// Delete the online basket.
  RemoteDelete
}

/// Logs engine events; outcomes are printed by the command itself.
struct CliEventHandler;

impl SyncEventHandler for CliEventHandler {
  fn on_status(&self, target: SyncTarget, status: SyncStatus) {
    debug!(?target, ?status, "status");
  }

  fn on_last_sync(&self, at: DateTime<Utc>) {
    info!(at = %format_time(at), "last sync");
  }

  fn on_auto_sync(&self, interval: Option<Duration>) {
    match interval {
      Some(i) => info!(interval_secs = i.as_secs(), "auto-sync running"),
      None => info!("auto-sync stopped")
    }
  }

  fn on_reload_scheduled(&self, delay: Duration) {
    info!(ms = delay.as_millis(), "reload requested");
  }
}

fn format_time(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn init_tracing(verbose: u8, default_level: &str) {
  let filter = match verbose {
    0 => default_level,
    1 => "debug",
    _ => "trace"
  };

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    )
    .with_writer(std::io::stderr)
    .compact()
    .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
  let mut config = match &cli.config {
    Some(path) => AppConfig::load(path)
      .with_context(|| format!("failed to load config {}", path.display()))?,
    None => AppConfig::default()
  };
  if let Some(dir) = &cli.data_dir {
    config.data_dir.clone_from(dir);
  }
  Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  let cli = Cli::parse();
  let config = load_config(&cli)?;
  init_tracing(cli.verbose, &config.logging.level);

  let events: Arc<dyn SyncEventHandler> = Arc::new(CliEventHandler);
  let (mirror, settings) =
    open_stores(&config, Arc::clone(&events)).context("failed to open data directory")?;
  debug!(data_dir = %config.data_dir.display(), "stores opened");

  let engine = SyncEngine::new(
    config.sync.clone(),
    mirror,
    Arc::clone(&settings),
    PantryConnector::from_config(&config),
    events
  );

  if let Some(err) = engine.init_remote_client() {
    print_outcome(&err);
  }

  let outcome = match cli.command {
    Commands::SyncLocal => engine.sync_local(),
    Commands::Push => engine.push_remote().await,
    Commands::Sync => engine.sync_all().await,
    Commands::SyncNow => engine.sync_now().await,
    Commands::Pull => engine.pull_remote().await,
    Commands::Restore => engine.restore_from_local_snapshot(),
    Commands::Export { out } => cmd_export(&engine, &out)?,
    Commands::Import { file } => {
      let text = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
      engine.import_snapshot(&text)
    }
    Commands::Config {
      interval,
      auto,
      online,
      store_id
    } => engine.save_config(&ConfigUpdate {
      interval_secs: interval,
      auto_sync: auto,
      online_sync: online,
      remote_store_id: store_id.unwrap_or_else(|| settings.remote_store_id())
    }),
    Commands::Status => {
      cmd_status(&engine);
      return Ok(ExitCode::SUCCESS);
    }
    Commands::Stats { layer } => return cmd_stats(&config, &engine, layer).await,
    Commands::Watch => return cmd_watch(&engine).await,
    Commands::RemoteInfo => cmd_remote_info(&engine).await,
    Commands::RemoteDelete => engine.delete_remote().await
  };

  print_outcome(&outcome);
  Ok(exit_code(&outcome))
}

fn print_outcome(outcome: &Outcome) {
  if outcome.is_error() {
    eprintln!("{}", outcome.message);
  } else {
    println!("{}", outcome.message);
  }
}

fn exit_code(outcome: &Outcome) -> ExitCode {
  if outcome.is_error() {
    ExitCode::FAILURE
  } else {
    ExitCode::SUCCESS
  }
}

/// Command export: write the snapshot under `out`.
fn cmd_export(engine: &Engine, out: &std::path::Path) -> anyhow::Result<Outcome> {
  let file = match engine.export_snapshot() {
    Ok(file) => file,
    Err(outcome) => return Ok(outcome)
  };

  std::fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
  let path = out.join(&file.file_name);
  std::fs::write(&path, &file.contents)
    .with_context(|| format!("failed to write {}", path.display()))?;

  Ok(Outcome::success(format!("Exported {}", path.display())))
}

/// Command status.
fn cmd_status(engine: &Engine) {
  let prefs = engine.preferences();
  let on_off = |b: bool| if b { "On" } else { "Off" };

  println!("Auto-sync:     {}", on_off(prefs.auto_sync_enabled));
  println!("Interval:      {}s", prefs.auto_sync_interval_secs);
  println!("Online sync:   {}", on_off(prefs.online_sync_enabled));
  println!(
    "Remote store:  {}",
    if prefs.remote_store_id.is_empty() {
      "not set"
    } else {
      "set"
    }
  );
  println!(
    "Last sync:     {}",
    prefs.last_sync_at.map_or_else(|| "Never".to_string(), format_time)
  );
  println!(
    "Snapshot:      {}",
    if engine.has_synced() { "present" } else { "none" }
  );
}

/// Command stats: board layer bonuses from the stored progress.
async fn cmd_stats(config: &AppConfig, engine: &Engine, layer: u32) -> anyhow::Result<ExitCode> {
  if let Err(e) = engine.settings().init_layer_multipliers() {
    tracing::warn!(error = %e, "failed to seed layer multipliers");
  }

  let source = HttpBoardSource::new(&config.remote.board_data_url)?;
  let service = LayerStatsService::new(
    source,
    Arc::clone(engine.mirror()),
    Arc::clone(engine.settings())
  );

  let stats = service.layer_stats(layer).await;
  println!("Layer {layer}");
  println!("{stats}");
  Ok(ExitCode::SUCCESS)
}

/// Command remote-info.
async fn cmd_remote_info(engine: &Engine) -> Outcome {
  let Some(client) = engine.remote_client() else {
    return Outcome::warning(kurisync_core::BasketError::NotConfigured.to_string());
  };

  match client.details().await {
    Ok(d) => {
      println!("Name:        {}", d.name);
      println!("Usage:       {:.1}%", d.percent_full);
      for b in &d.baskets {
        match b.ttl {
          Some(ttl) => println!("Basket:      {} (ttl {ttl}s)", b.name),
          None => println!("Basket:      {}", b.name)
        }
      }
      Outcome::info("Remote store reachable")
    }
    Err(e) => Outcome::error(format!("Remote info failed: {e}"))
  }
}

/// Command watch: run auto-sync until Ctrl-C.
async fn cmd_watch(engine: &Engine) -> anyhow::Result<ExitCode> {
  engine.resume();
  if !engine.is_auto_sync_active() {
    let secs = engine.settings().auto_sync_interval_secs(engine.config());
    print_outcome(&engine.start_auto_sync(secs));
  }

  info!("watching, press Ctrl-C to stop");
  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for Ctrl-C")?;

  info!("stopped");
  Ok(ExitCode::SUCCESS)
}
