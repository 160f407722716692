//! Synchronization engine.
//!
//! Owns everything a page session needs: the local mirror, the durable
//! settings, the remote basket client, the two status indicators and the
//! auto-sync timer. Every operation catches its own errors and returns an
//! [`Outcome`]; nothing is retried automatically.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, RwLock, Weak},
  time::Duration
};

use chrono::{Local, Utc};
use serde_json::Value;
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior, interval_at}
};
use tracing::{debug, error, info, warn};

use crate::{
  backup::{self, BackupFile},
  basket::{BasketConnector, BasketError, RemoteBasket},
  config::{ConfigUpdate, SyncConfig},
  events::SyncEventHandler,
  mirror::LocalMirrorStore,
  outcome::{Outcome, OutcomeKind, SyncStatus, SyncTarget},
  settings::{DurableSettingsStore, SyncPreferences, keys},
  snapshot::SyncSnapshot,
  status::StatusIndicator
};

/// Running auto-sync timer.
struct AutoSyncTimer {
  handle: JoinHandle<()>,
  interval: Duration
}

/// Synchronization engine.
///
/// Construct once per session with [`SyncEngine::new`] and share the
/// returned `Arc` with every handler.
pub struct SyncEngine<C: BasketConnector> {
  config: SyncConfig,
  mirror: Arc<LocalMirrorStore>,
  settings: Arc<DurableSettingsStore>,
  connector: C,
  remote: RwLock<Option<Arc<C::Basket>>>,
  events: Arc<dyn SyncEventHandler>,
  local_status: Arc<StatusIndicator>,
  remote_status: Arc<StatusIndicator>,
  timer: Mutex<Option<AutoSyncTimer>>
}

impl<C: BasketConnector> SyncEngine<C> {
  /// Create the engine. No client is built and no timer started; see [`Self::resume`].
  pub fn new(
    config: SyncConfig,
    mirror: Arc<LocalMirrorStore>,
    settings: Arc<DurableSettingsStore>,
    connector: C,
    events: Arc<dyn SyncEventHandler>
  ) -> Arc<Self> {
    let reset = config.status_reset_delay();
    Arc::new(Self {
      local_status: StatusIndicator::new(SyncTarget::Local, Arc::clone(&events), reset),
      remote_status: StatusIndicator::new(SyncTarget::Remote, Arc::clone(&events), reset),
      config,
      mirror,
      settings,
      connector,
      remote: RwLock::new(None),
      events,
      timer: Mutex::new(None)
    })
  }

  /// Restore session state from settings.
  ///
  /// Builds the remote client, seeds the multiplier table and restarts
  /// auto-sync if it was left on. Safe to call repeatedly.
  pub fn resume(self: &Arc<Self>) {
    self.init_remote_client();

    if let Err(e) = self.settings.init_layer_multipliers() {
      warn!(error = %e, "failed to seed layer multipliers");
    }

    if self.settings.auto_sync_enabled() && !self.is_auto_sync_active() {
      let secs = self.settings.auto_sync_interval_secs(&self.config);
      self.start_auto_sync(secs);
    }
  }

  /// (Re)build the remote client from the stored store ID.
  ///
  /// Returns an error outcome when the stored ID is rejected.
  pub fn init_remote_client(&self) -> Option<Outcome> {
    let id = self.settings.remote_store_id();

    let (client, outcome) = if id.is_empty() {
      (None, None)
    } else {
      match self.connector.connect(&id) {
        Ok(client) => (Some(Arc::new(client)), None),
        Err(e) => (
          None,
          Some(self.report(Outcome::error(format!("Invalid remote store ID: {e}"))))
        )
      }
    };

    debug!(configured = client.is_some(), "remote client initialized");
    *self
      .remote
      .write()
      .unwrap_or_else(std::sync::PoisonError::into_inner) = client;
    outcome
  }

  /// Is a remote client configured?
  #[must_use]
  pub fn is_remote_configured(&self) -> bool {
    self.remote_client().is_some()
  }

  /// Current remote client.
  #[must_use]
  pub fn remote_client(&self) -> Option<Arc<C::Basket>> {
    self
      .remote
      .read()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .clone()
  }

  /// Engine configuration.
  #[must_use]
  pub fn config(&self) -> &SyncConfig {
    &self.config
  }

  /// Local mirror.
  #[must_use]
  pub fn mirror(&self) -> &Arc<LocalMirrorStore> {
    &self.mirror
  }

  /// Durable settings.
  #[must_use]
  pub fn settings(&self) -> &Arc<DurableSettingsStore> {
    &self.settings
  }

  /// Stored preferences.
  #[must_use]
  pub fn preferences(&self) -> SyncPreferences {
    self.settings.preferences(&self.config)
  }

  /// Status indicator of `target`.
  #[must_use]
  pub fn status(&self, target: SyncTarget) -> SyncStatus {
    match target {
      SyncTarget::Local => self.local_status.get(),
      SyncTarget::Remote => self.remote_status.get()
    }
  }

  /// Has a local snapshot ever been captured?
  #[must_use]
  pub fn has_synced(&self) -> bool {
    self.settings.raw(keys::SNAPSHOT).is_some()
  }

  /// Capture the mirror into a new snapshot.
  pub fn sync_local(&self) -> Outcome {
    self.local_status.set(SyncStatus::Syncing);

    let snapshot = SyncSnapshot::now(self.mirror.read_all());
    let res = self
      .settings
      .set_snapshot(&snapshot)
      .and_then(|()| self.settings.set_last_sync_at(snapshot.timestamp));

    match res {
      Ok(()) => {
        debug!(keys = snapshot.data.len(), "local snapshot saved");
        self.local_status.set(SyncStatus::Success);
        self.report(Outcome::success("Local sync successful!"))
      }
      Err(e) => {
        self.local_status.set(SyncStatus::Error);
        self.report(Outcome::error(format!("Local sync failed: {e}")))
      }
    }
  }

  /// Replace the remote basket with the current mirror.
  pub async fn push_remote(&self) -> Outcome {
    let Some(client) = self.remote_client() else {
      return self.report(Outcome::warning(BasketError::NotConfigured.to_string()));
    };

    self.remote_status.set(SyncStatus::Syncing);

    let data = self.mirror.read_all();
    if let Err(e) = self.settings.set_last_sync_at(Utc::now()) {
      warn!(error = %e, "failed to record last sync");
    }

    let payload = Value::Object(
      data
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
    );

    match client.create_or_replace(&payload).await {
      Ok(_) => {
        self.remote_status.set(SyncStatus::Success);
        self.report(Outcome::success("Online sync successful!"))
      }
      Err(BasketError::NotConfigured) => {
        self.remote_status.set(SyncStatus::Idle);
        self.report(Outcome::warning(BasketError::NotConfigured.to_string()))
      }
      Err(e) => {
        self.remote_status.set(SyncStatus::Error);
        self.report(Outcome::error(format!("Online sync failed: {e}")))
      }
    }
  }

  /// Local sync followed by a remote push, strictly in that order.
  pub async fn sync_all(&self) -> Outcome {
    if !self.is_remote_configured() {
      return self.report(Outcome::warning(BasketError::NotConfigured.to_string()));
    }

    let local = self.sync_local();
    if local.is_error() {
      return local;
    }
    self.push_remote().await
  }

  /// Local sync, then a push when online sync is on and a client exists.
  ///
  /// This is what the sync button and each auto-sync tick run. Without
  /// online sync the local outcome is returned.
  pub async fn sync_now(&self) -> Outcome {
    let local = self.sync_local();
    if local.is_error() {
      return local;
    }

    if self.settings.online_sync_enabled() && self.is_remote_configured() {
      self.push_remote().await
    } else {
      local
    }
  }

  /// Overwrite the mirror with the remote basket, then request a reload.
  pub async fn pull_remote(&self) -> Outcome {
    let Some(client) = self.remote_client() else {
      return self.report(Outcome::warning(BasketError::NotConfigured.to_string()));
    };

    self.remote_status.set(SyncStatus::Syncing);

    let remote = match client.fetch().await {
      Ok(v) => v,
      Err(BasketError::NotFound) => {
        self.remote_status.set(SyncStatus::Idle);
        return self.report(Outcome::info("No online data found"));
      }
      Err(e) => {
        self.remote_status.set(SyncStatus::Error);
        return self.report(Outcome::error(format!("Pull failed: {e}")));
      }
    };

    let res = backup::data_from_value(remote)
      .map_err(|e| e.to_string())
      .and_then(|data| self.replace_mirror(&data).map_err(|e| e.to_string()));

    match res {
      Ok(()) => {
        self.remote_status.set(SyncStatus::Success);
        let outcome = self.report(Outcome::success("Online data pulled!"));
        self.schedule_reload();
        outcome
      }
      Err(e) => {
        self.remote_status.set(SyncStatus::Error);
        self.report(Outcome::error(format!("Pull failed: {e}")))
      }
    }
  }

  /// Overwrite the mirror with the latest local snapshot, then request a reload.
  pub fn restore_from_local_snapshot(&self) -> Outcome {
    self.local_status.set(SyncStatus::Syncing);

    let Some(raw) = self.settings.raw(keys::SNAPSHOT) else {
      self.local_status.set(SyncStatus::Idle);
      return self.report(Outcome::warning("No local synced data"));
    };

    let res = serde_json::from_str::<SyncSnapshot>(&raw)
      .map_err(|e| e.to_string())
      .and_then(|snap| self.replace_mirror(&snap.data).map_err(|e| e.to_string()));

    match res {
      Ok(()) => {
        self.local_status.set(SyncStatus::Success);
        let outcome = self.report(Outcome::success("Local data restored!"));
        self.schedule_reload();
        outcome
      }
      Err(e) => {
        self.local_status.set(SyncStatus::Error);
        self.report(Outcome::error(format!("Restore failed: {e}")))
      }
    }
  }

  /// Delete the remote basket.
  pub async fn delete_remote(&self) -> Outcome {
    let Some(client) = self.remote_client() else {
      return self.report(Outcome::warning(BasketError::NotConfigured.to_string()));
    };

    match client.delete().await {
      Ok(_) => self.report(Outcome::success("Online data deleted")),
      Err(BasketError::NotFound) => self.report(Outcome::info("No online data found")),
      Err(e) => self.report(Outcome::error(format!("Delete failed: {e}")))
    }
  }

  /// The stored snapshot as a downloadable file.
  ///
  /// # Errors
  ///
  /// Returns a warning outcome when nothing was captured yet.
  pub fn export_snapshot(&self) -> Result<BackupFile, Outcome> {
    let Some(contents) = self.settings.raw(keys::SNAPSHOT) else {
      return Err(self.report(Outcome::warning("Nothing to export")));
    };

    let file = BackupFile {
      file_name: backup::backup_file_name(&Local::now()),
      contents
    };
    self.report(Outcome::success("Exported JSON backup"));
    Ok(file)
  }

  /// Import a backup file: store it as the snapshot, restore it, request a reload.
  ///
  /// Nothing is written if the file does not parse.
  pub fn import_snapshot(&self, contents: &str) -> Outcome {
    let data = match backup::parse_backup(contents) {
      Ok(data) => data,
      Err(e) => return self.report(Outcome::error(format!("Import failed: {e}")))
    };

    let data: BTreeMap<String, String> = data
      .into_iter()
      .filter(|(k, _)| self.mirror.is_allowed(k))
      .collect();
    let snapshot = SyncSnapshot::now(data);

    let res = self
      .settings
      .set_snapshot(&snapshot)
      .and_then(|()| self.replace_mirror(&snapshot.data));

    match res {
      Ok(()) => {
        let outcome = self.report(Outcome::success("Imported JSON! Reloading..."));
        self.schedule_reload();
        outcome
      }
      Err(e) => self.report(Outcome::error(format!("Import failed: {e}")))
    }
  }

  /// Validate and persist a configuration change, then apply it.
  ///
  /// An invalid update is rejected before anything is written.
  pub fn save_config(self: &Arc<Self>, update: &ConfigUpdate) -> Outcome {
    if let Err(e) = update.validate(&self.config) {
      return self.report(Outcome::error(e.to_string()));
    }

    if let Err(e) = self.settings.apply_update(update) {
      return self.report(Outcome::error(format!("Saving configuration failed: {e}")));
    }

    self.init_remote_client();

    if update.auto_sync {
      self.start_auto_sync(update.interval_secs);
    } else {
      self.stop_auto_sync();
    }

    let auto = if update.auto_sync {
      format!("{}s", update.interval_secs)
    } else {
      "Off".to_string()
    };
    let online = if update.online_sync && self.is_remote_configured() {
      "On"
    } else {
      "Off"
    };
    self.report(Outcome::success(format!("Saved! Auto: {auto} | Online: {online}")))
  }

  /// Start (or restart) the auto-sync timer.
  ///
  /// Any running timer is cancelled first. Each tick runs a local sync
  /// and then, when online sync is on and a client exists, a push.
  pub fn start_auto_sync(self: &Arc<Self>, secs: u64) -> Outcome {
    self.cancel_timer();

    let Ok(rt) = tokio::runtime::Handle::try_current() else {
      return self.report(Outcome::error("Auto-sync needs a running async runtime"));
    };

    let min = self.config.min_interval();
    let secs = if secs < min {
      warn!(secs, min, "interval below minimum, clamping");
      min
    } else {
      secs
    };
    let period = Duration::from_secs(secs);

    let weak = Arc::downgrade(self);
    let handle = rt.spawn(Self::auto_sync_worker(weak, period));
    *self.lock_timer() = Some(AutoSyncTimer {
      handle,
      interval: period
    });

    if let Err(e) = self
      .settings
      .set(keys::AUTO_SYNC_INTERVAL, &secs)
      .and_then(|()| self.settings.set(keys::AUTO_SYNC_ENABLED, &true))
    {
      warn!(error = %e, "failed to persist auto-sync settings");
    }

    info!(interval_secs = secs, "auto-sync started");
    self.events.on_auto_sync(Some(period));
    self.report(Outcome::info(format!("Auto-sync started ({secs}s)")))
  }

  /// Stop the auto-sync timer and clear the enabled flag.
  pub fn stop_auto_sync(&self) {
    let was_running = self.cancel_timer();

    if let Err(e) = self.settings.delete(keys::AUTO_SYNC_ENABLED) {
      warn!(error = %e, "failed to clear auto-sync flag");
    }

    if was_running {
      info!("auto-sync stopped");
    }
    self.events.on_auto_sync(None);
  }

  /// Is the auto-sync timer running?
  #[must_use]
  pub fn is_auto_sync_active(&self) -> bool {
    self
      .lock_timer()
      .as_ref()
      .is_some_and(|t| !t.handle.is_finished())
  }

  /// Period of the running timer.
  #[must_use]
  pub fn auto_sync_interval(&self) -> Option<Duration> {
    self.lock_timer().as_ref().map(|t| t.interval)
  }

  /// Timer loop. Holds only a weak reference so dropping the engine ends it.
  async fn auto_sync_worker(engine: Weak<Self>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;

      let Some(this) = engine.upgrade() else {
        break;
      };

      debug!("auto-sync tick");
      this.sync_now().await;
    }

    debug!("auto-sync worker finished");
  }

  /// Abort the running timer; returns whether one was running.
  fn cancel_timer(&self) -> bool {
    match self.lock_timer().take() {
      Some(timer) => {
        timer.handle.abort();
        true
      }
      None => false
    }
  }

  fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<AutoSyncTimer>> {
    self
      .timer
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  fn replace_mirror(
    &self,
    data: &BTreeMap<String, String>
  ) -> Result<(), crate::storage::StorageError> {
    self.mirror.clear_all()?;
    self.mirror.write_all(data)
  }

  /// Ask the host to reload once the configured delay has passed.
  fn schedule_reload(&self) {
    let delay = self.config.reload_delay();
    self.events.on_reload_scheduled(delay);

    let Ok(rt) = tokio::runtime::Handle::try_current() else {
      self.events.on_reload();
      return;
    };
    let events = Arc::clone(&self.events);
    rt.spawn(async move {
      tokio::time::sleep(delay).await;
      events.on_reload();
    });
  }

  fn report(&self, outcome: Outcome) -> Outcome {
    match outcome.kind {
      OutcomeKind::Error => error!(message = %outcome.message, "sync operation failed"),
      OutcomeKind::Warning => warn!(message = %outcome.message, "sync operation skipped"),
      _ => debug!(message = %outcome.message, "sync operation done")
    }
    self.events.on_outcome(&outcome);
    outcome
  }
}

impl<C: BasketConnector> Drop for SyncEngine<C> {
  fn drop(&mut self) {
    self.cancel_timer();
  }
}
