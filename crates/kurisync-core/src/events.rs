//! Engine event handler for the UI layer (renderer, CLI, logs).

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::outcome::{Outcome, SyncStatus, SyncTarget};

/// Event handler for the UI layer.
///
/// The core never renders anything; it reports here and the UI decides
/// what to draw. All methods default to no-ops, so implementors override
/// only what they need.
#[allow(unused_variables)]
pub trait SyncEventHandler: Send + Sync + 'static {
  /// Status indicator of `target` changed.
  fn on_status(&self, target: SyncTarget, status: SyncStatus) {}

  /// An operation finished (notification).
  fn on_outcome(&self, outcome: &Outcome) {}

  /// Last-sync timestamp was written.
  fn on_last_sync(&self, at: DateTime<Utc>) {}

  /// Auto-sync scheduler started (`Some(interval)`) or stopped (`None`).
  fn on_auto_sync(&self, interval: Option<Duration>) {}

  /// Local data was replaced; a reload follows after `delay`.
  fn on_reload_scheduled(&self, delay: Duration) {}

  /// The host should reload now.
  fn on_reload(&self) {}
}

/// Handler that ignores everything.
pub struct NoopEventHandler;

impl SyncEventHandler for NoopEventHandler {}
