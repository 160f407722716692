//! Per-target status indicator with delayed revert to idle.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering}
  },
  time::Duration
};

use crate::{
  events::SyncEventHandler,
  outcome::{SyncStatus, SyncTarget}
};

/// Tracks `idle -> syncing -> success|error -> idle` for one target.
pub(crate) struct StatusIndicator {
  target: SyncTarget,
  events: Arc<dyn SyncEventHandler>,
  reset_delay: Duration,
  current: Mutex<SyncStatus>,
  /// Bumped on every change; a pending revert only fires if it still matches.
  generation: AtomicU64
}

impl StatusIndicator {
  pub(crate) fn new(
    target: SyncTarget,
    events: Arc<dyn SyncEventHandler>,
    reset_delay: Duration
  ) -> Arc<Self> {
    Arc::new(Self {
      target,
      events,
      reset_delay,
      current: Mutex::new(SyncStatus::Idle),
      generation: AtomicU64::new(0)
    })
  }

  pub(crate) fn get(&self) -> SyncStatus {
    *self
      .current
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  pub(crate) fn set(self: &Arc<Self>, status: SyncStatus) {
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *self
      .current
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner) = status;
    self.events.on_status(self.target, status);

    if !status.is_terminal() {
      return;
    }

    // Without a runtime there is nobody to revert; the next set() will.
    let Ok(rt) = tokio::runtime::Handle::try_current() else {
      return;
    };
    let this = Arc::clone(self);
    rt.spawn(async move {
      tokio::time::sleep(this.reset_delay).await;
      if this.generation.load(Ordering::SeqCst) == generation {
        this.set(SyncStatus::Idle);
      }
    });
  }
}
