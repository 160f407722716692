//! `KuriSync` configuration.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Host configuration (CLI or any other embedding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
  /// Directory holding the mirror and settings files.
  #[serde(default = "AppConfig::default_data_dir")]
  pub data_dir: PathBuf,
  /// Sync settings.
  #[serde(default)]
  pub sync: SyncConfig,
  /// Remote endpoints.
  #[serde(default)]
  pub remote: RemoteConfig,
  /// Logging settings.
  #[serde(default)]
  pub logging: LoggingConfig
}

impl AppConfig {
  fn default_data_dir() -> PathBuf {
    PathBuf::from(".kurisync")
  }

  /// Load from a JSON file; missing fields take their defaults.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if
  /// `sync.min_interval_secs` is zero.
  pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
    let text = std::fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&text)?;
    if config.sync.min_interval_secs == 0 {
      anyhow::bail!("sync.min_interval_secs must be at least 1");
    }
    Ok(config)
  }

  /// File backing the page-local mirror.
  #[must_use]
  pub fn local_storage_path(&self) -> PathBuf {
    self.data_dir.join("local_storage.json")
  }

  /// File backing the durable settings.
  #[must_use]
  pub fn settings_path(&self) -> PathBuf {
    self.data_dir.join("settings.json")
  }
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      data_dir: Self::default_data_dir(),
      sync: SyncConfig::default(),
      remote: RemoteConfig::default(),
      logging: LoggingConfig::default()
    }
  }
}

/// Sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
  /// Name of the remote basket.
  #[serde(default = "SyncConfig::default_basket_name")]
  pub basket_name: String,
  /// Allow-listed host storage keys.
  #[serde(default = "SyncConfig::default_storage_keys")]
  pub storage_keys: Vec<String>,
  /// Key holding the board progress JSON.
  #[serde(default = "SyncConfig::default_progress_key")]
  pub progress_key: String,
  /// Auto-sync interval used when none is stored (seconds).
  #[serde(default = "SyncConfig::default_interval_secs")]
  pub default_interval_secs: u64,
  /// Smallest accepted auto-sync interval (seconds).
  #[serde(default = "SyncConfig::default_min_interval_secs")]
  pub min_interval_secs: u64,
  /// Delay before a terminal status reverts to idle (ms).
  #[serde(default = "SyncConfig::default_status_reset_delay_ms")]
  pub status_reset_delay_ms: u64,
  /// Delay between a destructive restore and the reload request (ms).
  #[serde(default = "SyncConfig::default_reload_delay_ms")]
  pub reload_delay_ms: u64
}

impl SyncConfig {
  fn default_basket_name() -> String {
    "kurisutaru.trickcal.nossite".to_string()
  }

  fn default_storage_keys() -> Vec<String> {
    [
      "trickcal_board_progress",
      "trickcal_language",
      "trickcal_sweep_selected_materials",
      "trickcal_theme"
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
  }

  fn default_progress_key() -> String {
    "trickcal_board_progress".to_string()
  }

  const fn default_interval_secs() -> u64 {
    300
  }

  const fn default_min_interval_secs() -> u64 {
    10
  }

  const fn default_status_reset_delay_ms() -> u64 {
    3000
  }

  const fn default_reload_delay_ms() -> u64 {
    1000
  }

  /// Smallest accepted auto-sync interval; never below one second.
  #[must_use]
  pub const fn min_interval(&self) -> u64 {
    if self.min_interval_secs == 0 {
      1
    } else {
      self.min_interval_secs
    }
  }

  /// Status reset delay as `Duration`.
  #[must_use]
  pub const fn status_reset_delay(&self) -> Duration {
    Duration::from_millis(self.status_reset_delay_ms)
  }

  /// Reload delay as `Duration`.
  #[must_use]
  pub const fn reload_delay(&self) -> Duration {
    Duration::from_millis(self.reload_delay_ms)
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      basket_name: Self::default_basket_name(),
      storage_keys: Self::default_storage_keys(),
      progress_key: Self::default_progress_key(),
      default_interval_secs: Self::default_interval_secs(),
      min_interval_secs: Self::default_min_interval_secs(),
      status_reset_delay_ms: Self::default_status_reset_delay_ms(),
      reload_delay_ms: Self::default_reload_delay_ms()
    }
  }
}

/// Remote endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
  /// Pantry API root; the store ID is appended.
  #[serde(default = "RemoteConfig::default_pantry_base_url")]
  pub pantry_base_url: String,
  /// Board layout metadata.
  #[serde(default = "RemoteConfig::default_board_data_url")]
  pub board_data_url: String
}

impl RemoteConfig {
  fn default_pantry_base_url() -> String {
    "https://getpantry.cloud/apiv1/pantry".to_string()
  }

  fn default_board_data_url() -> String {
    "https://trickcal.nossite.com/board/data.json".to_string()
  }
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      pantry_base_url: Self::default_pantry_base_url(),
      board_data_url: Self::default_board_data_url()
    }
  }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  /// Log level.
  #[serde(default = "LoggingConfig::default_level")]
  pub level: String
}

impl LoggingConfig {
  fn default_level() -> String {
    "info".to_string()
  }
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: Self::default_level()
    }
  }
}

/// A configuration save request from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
  /// Requested auto-sync interval (seconds).
  pub interval_secs: u64,
  /// Turn auto-sync on or off.
  pub auto_sync: bool,
  /// Push to the remote basket after each auto-sync tick.
  pub online_sync: bool,
  /// Remote store ID; blank clears it.
  pub remote_store_id: String
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  /// Interval below the allowed minimum.
  #[error("Interval must be ≥{min}s")]
  IntervalTooSmall {
    /// Allowed minimum.
    min: u64
  }
}

impl ConfigUpdate {
  /// Check the update against `config` before anything is written.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::IntervalTooSmall`] below the configured minimum.
  pub const fn validate(&self, config: &SyncConfig) -> Result<(), ConfigError> {
    let min = config.min_interval();
    if self.interval_secs < min {
      return Err(ConfigError::IntervalTooSmall { min });
    }
    Ok(())
  }
}
