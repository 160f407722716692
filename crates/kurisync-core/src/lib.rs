//! kurisync-core: local-mirror / remote-basket sync core for `KuriSync`.
//!
//! Contains:
//! - `LocalMirrorStore`: allow-listed view over the host page's local storage
//! - `DurableSettingsStore`: typed preferences, snapshot and multipliers
//! - `RemoteBasket` / `BasketConnector`: transport seam to the remote basket service
//! - `SyncEngine`: local capture, remote push/pull, restore, backup, auto-sync timer
//! - `compute_stats` / `LayerStatsService`: layer bonus stats from board progress
//! - `SyncEventHandler`: trait for events (UI, logs)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  outcomes/events  ┌──────────────┐     ┌──────────────┐
//! │ UI / host    │ ◄──────────────── │  SyncEngine  │ ──► │ RemoteBasket │
//! │ (renderer,   │ ────────────────► │ (timer+state)│     │ (pantry)     │
//! │  CLI)        │    operations     └──────┬───────┘     └──────────────┘
//! └──────────────┘                          │
//!                          ┌────────────────┼────────────────┐
//!                   ┌──────▼────────┐ ┌─────▼──────────────┐ │
//!                   │LocalMirrorStore│ │DurableSettingsStore│ │
//!                   └──────┬────────┘ └────────────────────┘ │
//!                          │          ┌──────────────────────▼┐
//!                          └────────► │  LayerStatsService    │
//!                                     └───────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod backup;
pub mod basket;
pub mod config;
pub mod events;
pub mod mirror;
pub mod outcome;
pub mod settings;
pub mod snapshot;
pub mod stats;
mod status;
pub mod storage;
pub mod sync_engine;
pub mod test_utils;

pub use backup::{BackupError, BackupFile};
pub use basket::{BasketConnector, BasketError, RemoteBasket};
pub use config::{AppConfig, ConfigError, ConfigUpdate, LoggingConfig, RemoteConfig, SyncConfig};
pub use events::{NoopEventHandler, SyncEventHandler};
pub use mirror::LocalMirrorStore;
pub use outcome::{Outcome, OutcomeKind, SyncStatus, SyncTarget};
pub use settings::{DurableSettingsStore, SyncPreferences};
pub use snapshot::SyncSnapshot;
pub use stats::{
  BoardMetadata, BoardProgress, BoardSource, LayerMultipliers, LayerStats, LayerStatsService,
  StatCategory, StatLine, StatValue, compute_stats
};
pub use storage::{JsonFileStore, KvStore, MemoryStore, StorageError};
pub use sync_engine::SyncEngine;

use std::sync::Arc;

/// Open the file-backed stores under `config.data_dir`.
///
/// The settings store reports last-sync writes to `events`.
///
/// # Errors
///
/// Returns an error if either store file exists but cannot be read.
pub fn open_stores(
  config: &AppConfig,
  events: Arc<dyn SyncEventHandler>
) -> anyhow::Result<(Arc<LocalMirrorStore>, Arc<DurableSettingsStore>)> {
  let local = JsonFileStore::open(config.local_storage_path())?;
  let settings = JsonFileStore::open(config.settings_path())?;

  let mirror = Arc::new(LocalMirrorStore::new(Arc::new(local), &config.sync));
  let settings = Arc::new(DurableSettingsStore::new(Arc::new(settings)).with_events(events));

  Ok((mirror, settings))
}
