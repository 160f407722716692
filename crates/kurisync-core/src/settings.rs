//! Durable settings: sync preferences, remote store ID, snapshot, multipliers.
//!
//! Values are stored as JSON text under fixed keys and read back with
//! caller-supplied defaults. A value that no longer parses reads as the
//! default.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
  config::{ConfigUpdate, SyncConfig},
  events::{NoopEventHandler, SyncEventHandler},
  snapshot::SyncSnapshot,
  stats::LayerMultipliers,
  storage::{KvStore, StorageError}
};

/// Setting keys.
pub mod keys {
  /// Remote store ID.
  pub const REMOTE_STORE_ID: &str = "pantry_id";
  /// Push after each auto-sync tick.
  pub const ONLINE_SYNC_ENABLED: &str = "online_sync_enabled";
  /// Auto-sync on.
  pub const AUTO_SYNC_ENABLED: &str = "auto_sync_enabled";
  /// Auto-sync interval (seconds).
  pub const AUTO_SYNC_INTERVAL: &str = "auto_sync_interval";
  /// Last sync (ISO 8601).
  pub const LAST_SYNC_AT: &str = "last_sync_date";
  /// Per-layer stat multipliers.
  pub const LAYER_MULTIPLIERS: &str = "layer_multipliers";
  /// Latest [`SyncSnapshot`](crate::SyncSnapshot).
  pub const SNAPSHOT: &str = "trickcal_sync_data";
}

/// Sync preferences as currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPreferences {
  /// Auto-sync on.
  pub auto_sync_enabled: bool,
  /// Auto-sync interval (seconds).
  pub auto_sync_interval_secs: u64,
  /// Push after each auto-sync tick.
  pub online_sync_enabled: bool,
  /// Remote store ID; empty when unset.
  pub remote_store_id: String,
  /// Last successful sync, if any.
  pub last_sync_at: Option<DateTime<Utc>>
}

/// Typed settings over a [`KvStore`].
pub struct DurableSettingsStore {
  store: Arc<dyn KvStore>,
  events: Arc<dyn SyncEventHandler>
}

impl DurableSettingsStore {
  /// Wrap `store`.
  pub fn new(store: Arc<dyn KvStore>) -> Self {
    Self {
      store,
      events: Arc::new(NoopEventHandler)
    }
  }

  /// Report last-sync writes to `events`.
  #[must_use]
  pub fn with_events(mut self, events: Arc<dyn SyncEventHandler>) -> Self {
    self.events = events;
    self
  }

  /// Read `key`, or `default` when missing or unparseable.
  pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
    let Some(raw) = self.store.get(key) else {
      return default;
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
      warn!(key, error = %e, "corrupt setting, using default");
      default
    })
  }

  /// Raw JSON text of `key`.
  #[must_use]
  pub fn raw(&self, key: &str) -> Option<String> {
    self.store.get(key)
  }

  /// Write `key`.
  ///
  /// # Errors
  ///
  /// Returns a serialization or storage error.
  pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string(value)?;
    self.store.set(key, &json)
  }

  /// Remove `key`.
  ///
  /// # Errors
  ///
  /// Returns a storage error.
  pub fn delete(&self, key: &str) -> Result<(), StorageError> {
    self.store.remove(key)
  }

  /// Trimmed remote store ID; empty when unset.
  #[must_use]
  pub fn remote_store_id(&self) -> String {
    self.get(keys::REMOTE_STORE_ID, String::new()).trim().to_string()
  }

  /// Is online sync enabled?
  #[must_use]
  pub fn online_sync_enabled(&self) -> bool {
    self.get(keys::ONLINE_SYNC_ENABLED, false)
  }

  /// Is auto-sync enabled?
  #[must_use]
  pub fn auto_sync_enabled(&self) -> bool {
    self.get(keys::AUTO_SYNC_ENABLED, false)
  }

  /// Stored auto-sync interval, or the configured default.
  #[must_use]
  pub fn auto_sync_interval_secs(&self, config: &SyncConfig) -> u64 {
    self.get(keys::AUTO_SYNC_INTERVAL, config.default_interval_secs)
  }

  /// Last sync time, if any sync happened.
  #[must_use]
  pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
    self.get(keys::LAST_SYNC_AT, None)
  }

  /// Record a sync at `at` and notify listeners.
  ///
  /// # Errors
  ///
  /// Returns a storage error.
  pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
    self.set(keys::LAST_SYNC_AT, &at)?;
    self.events.on_last_sync(at);
    Ok(())
  }

  /// All preferences at once.
  #[must_use]
  pub fn preferences(&self, config: &SyncConfig) -> SyncPreferences {
    SyncPreferences {
      auto_sync_enabled: self.auto_sync_enabled(),
      auto_sync_interval_secs: self.auto_sync_interval_secs(config),
      online_sync_enabled: self.online_sync_enabled(),
      remote_store_id: self.remote_store_id(),
      last_sync_at: self.last_sync_at()
    }
  }

  /// Persist interval, online flag and store ID of a validated update.
  ///
  /// The auto-sync flag is owned by the scheduler and not written here.
  ///
  /// # Errors
  ///
  /// Returns a storage error.
  pub fn apply_update(&self, update: &ConfigUpdate) -> Result<(), StorageError> {
    self.set(keys::AUTO_SYNC_INTERVAL, &update.interval_secs)?;
    self.set(keys::ONLINE_SYNC_ENABLED, &update.online_sync)?;

    let id = update.remote_store_id.trim();
    if id.is_empty() {
      self.delete(keys::REMOTE_STORE_ID)?;
    } else {
      self.set(keys::REMOTE_STORE_ID, id)?;
    }

    debug!(interval = update.interval_secs, online = update.online_sync, "preferences saved");
    Ok(())
  }

  /// Latest snapshot, if one was captured.
  #[must_use]
  pub fn snapshot(&self) -> Option<SyncSnapshot> {
    self.get(keys::SNAPSHOT, None)
  }

  /// Replace the stored snapshot.
  ///
  /// # Errors
  ///
  /// Returns a serialization or storage error.
  pub fn set_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), StorageError> {
    self.set(keys::SNAPSHOT, snapshot)
  }

  /// Stored multipliers, or the default table.
  #[must_use]
  pub fn layer_multipliers(&self) -> LayerMultipliers {
    self.get(keys::LAYER_MULTIPLIERS, LayerMultipliers::default())
  }

  /// Persist user multipliers.
  ///
  /// # Errors
  ///
  /// Returns a serialization or storage error.
  pub fn set_layer_multipliers(&self, multipliers: &LayerMultipliers) -> Result<(), StorageError> {
    self.set(keys::LAYER_MULTIPLIERS, multipliers)
  }

  /// Store the default multiplier table unless one is already stored.
  ///
  /// # Errors
  ///
  /// Returns a serialization or storage error.
  pub fn init_layer_multipliers(&self) -> Result<(), StorageError> {
    if self.raw(keys::LAYER_MULTIPLIERS).is_none() {
      self.set_layer_multipliers(&LayerMultipliers::default())?;
    }
    Ok(())
  }
}
