//! Test utilities: `MockConnector`, `MockBasket`, `MockBoardSource` and `TestEventHandler`.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering}
  },
  time::Duration
};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
  basket::{BasketConnector, BasketError, RemoteBasket},
  events::SyncEventHandler,
  outcome::{Outcome, SyncStatus, SyncTarget},
  stats::{BoardMetadata, BoardSource}
};

#[derive(Default)]
struct MockBasketState {
  contents: Mutex<Option<Value>>,
  error: Mutex<Option<BasketError>>,
  delay: Mutex<Option<Duration>>,
  fetch_calls: AtomicUsize,
  create_calls: AtomicUsize,
  merge_calls: AtomicUsize,
  delete_calls: AtomicUsize
}

/// In-memory basket with the same semantics as the remote service.
///
/// Clones share state, so a test can keep a handle to the basket the
/// engine is using.
#[derive(Clone, Default)]
pub struct MockBasket {
  state: Arc<MockBasketState>
}

impl MockBasket {
  /// Empty basket (fetch yields `NotFound`).
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Current contents.
  pub fn contents(&self) -> Option<Value> {
    self.state.contents.lock().expect("lock").clone()
  }

  /// Replace the contents.
  pub fn set_contents(&self, value: Value) {
    *self.state.contents.lock().expect("lock") = Some(value);
  }

  /// Fail every call with `error`.
  pub fn fail_with(&self, error: BasketError) {
    *self.state.error.lock().expect("lock") = Some(error);
  }

  /// Stop failing.
  pub fn clear_error(&self) {
    *self.state.error.lock().expect("lock") = None;
  }

  /// Delay every call by `delay`.
  pub fn set_delay(&self, delay: Duration) {
    *self.state.delay.lock().expect("lock") = Some(delay);
  }

  /// Number of `fetch` calls.
  pub fn fetch_calls(&self) -> usize {
    self.state.fetch_calls.load(Ordering::SeqCst)
  }

  /// Number of `create_or_replace` calls.
  pub fn create_calls(&self) -> usize {
    self.state.create_calls.load(Ordering::SeqCst)
  }

  /// Number of `merge` calls.
  pub fn merge_calls(&self) -> usize {
    self.state.merge_calls.load(Ordering::SeqCst)
  }

  /// Number of `delete` calls.
  pub fn delete_calls(&self) -> usize {
    self.state.delete_calls.load(Ordering::SeqCst)
  }

  async fn enter(&self, counter: &AtomicUsize) -> Result<(), BasketError> {
    counter.fetch_add(1, Ordering::SeqCst);

    let delay = *self.state.delay.lock().expect("lock");
    if let Some(d) = delay {
      tokio::time::sleep(d).await;
    }

    let error = self.state.error.lock().expect("lock").clone();
    error.map_or(Ok(()), Err)
  }
}

impl RemoteBasket for MockBasket {
  async fn fetch(&self) -> Result<Value, BasketError> {
    self.enter(&self.state.fetch_calls).await?;
    self.contents().ok_or(BasketError::NotFound)
  }

  async fn create_or_replace(&self, payload: &Value) -> Result<Value, BasketError> {
    self.enter(&self.state.create_calls).await?;
    self.set_contents(payload.clone());
    Ok(Value::String("Your basket was created".to_string()))
  }

  async fn merge(&self, payload: &Value) -> Result<Value, BasketError> {
    self.enter(&self.state.merge_calls).await?;
    let mut contents = self.state.contents.lock().expect("lock");
    let Some(Value::Object(existing)) = contents.as_mut() else {
      return Err(BasketError::NotFound);
    };
    if let Value::Object(incoming) = payload {
      for (k, v) in incoming {
        existing.insert(k.clone(), v.clone());
      }
    }
    Ok(Value::Object(existing.clone()))
  }

  async fn delete(&self) -> Result<Value, BasketError> {
    self.enter(&self.state.delete_calls).await?;
    self
      .state
      .contents
      .lock()
      .expect("lock")
      .take()
      .map(|_| Value::String("Basket deleted".to_string()))
      .ok_or(BasketError::NotFound)
  }
}

/// Connector handing out one shared [`MockBasket`].
#[derive(Clone, Default)]
pub struct MockConnector {
  basket: MockBasket,
  reject: Arc<AtomicBool>,
  connects: Arc<Mutex<Vec<String>>>
}

impl MockConnector {
  /// Create a connector.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// The shared basket.
  pub fn basket(&self) -> MockBasket {
    self.basket.clone()
  }

  /// Reject every store ID from now on.
  pub fn reject_ids(&self) {
    self.reject.store(true, Ordering::SeqCst);
  }

  /// Store IDs passed to `connect`.
  pub fn connects(&self) -> Vec<String> {
    self.connects.lock().expect("lock").clone()
  }
}

impl BasketConnector for MockConnector {
  type Basket = MockBasket;

  fn connect(&self, store_id: &str) -> Result<MockBasket, BasketError> {
    self.connects.lock().expect("lock").push(store_id.to_string());
    if store_id.trim().is_empty() || self.reject.load(Ordering::SeqCst) {
      return Err(BasketError::NotConfigured);
    }
    Ok(self.basket.clone())
  }
}

/// Board source returning a fixed layout, or failing.
pub struct MockBoardSource {
  board: Mutex<Option<BoardMetadata>>,
  calls: AtomicUsize
}

impl MockBoardSource {
  /// Source returning `board` (or failing when `None`).
  #[must_use]
  pub fn new(board: Option<BoardMetadata>) -> Self {
    Self {
      board: Mutex::new(board),
      calls: AtomicUsize::new(0)
    }
  }

  /// Replace the layout returned by later fetches.
  pub fn set_board(&self, board: Option<BoardMetadata>) {
    *self.board.lock().expect("lock") = board;
  }

  /// Number of fetches.
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl BoardSource for Arc<MockBoardSource> {
  async fn fetch_board(&self) -> anyhow::Result<BoardMetadata> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .board
      .lock()
      .expect("lock")
      .clone()
      .ok_or_else(|| anyhow::anyhow!("HTTP 503"))
  }
}

/// Test event handler that records all calls.
#[derive(Default)]
pub struct TestEventHandler {
  /// Recorded `on_status` calls.
  pub status_calls: Mutex<Vec<(SyncTarget, SyncStatus)>>,
  /// Recorded `on_outcome` calls.
  pub outcome_calls: Mutex<Vec<Outcome>>,
  /// Recorded `on_last_sync` calls.
  pub last_sync: Mutex<Vec<DateTime<Utc>>>,
  /// Recorded `on_auto_sync` calls.
  pub auto_sync_calls: Mutex<Vec<Option<Duration>>>,
  /// Number of `on_reload_scheduled` calls.
  pub reload_scheduled: AtomicUsize,
  /// Number of `on_reload` calls.
  pub reloads: AtomicUsize
}

impl TestEventHandler {
  /// Create an empty handler.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Statuses reported for `target`, in order.
  pub fn statuses(&self, target: SyncTarget) -> Vec<SyncStatus> {
    self
      .status_calls
      .lock()
      .expect("lock")
      .iter()
      .filter(|(t, _)| *t == target)
      .map(|(_, s)| *s)
      .collect()
  }

  /// All outcomes, in order.
  pub fn outcomes(&self) -> Vec<Outcome> {
    self.outcome_calls.lock().expect("lock").clone()
  }

  /// Outcomes whose message contains `needle`.
  pub fn outcome_count(&self, needle: &str) -> usize {
    self
      .outcome_calls
      .lock()
      .expect("lock")
      .iter()
      .filter(|o| o.message.contains(needle))
      .count()
  }

  /// All `on_last_sync` timestamps.
  pub fn last_sync_calls(&self) -> Vec<DateTime<Utc>> {
    self.last_sync.lock().expect("lock").clone()
  }

  /// Number of `on_reload_scheduled` calls.
  pub fn reload_scheduled_count(&self) -> usize {
    self.reload_scheduled.load(Ordering::SeqCst)
  }

  /// Number of `on_reload` calls.
  pub fn reload_count(&self) -> usize {
    self.reloads.load(Ordering::SeqCst)
  }
}

impl SyncEventHandler for TestEventHandler {
  fn on_status(&self, target: SyncTarget, status: SyncStatus) {
    self.status_calls.lock().expect("lock").push((target, status));
  }

  fn on_outcome(&self, outcome: &Outcome) {
    self.outcome_calls.lock().expect("lock").push(outcome.clone());
  }

  fn on_last_sync(&self, at: DateTime<Utc>) {
    self.last_sync.lock().expect("lock").push(at);
  }

  fn on_auto_sync(&self, interval: Option<Duration>) {
    self.auto_sync_calls.lock().expect("lock").push(interval);
  }

  fn on_reload_scheduled(&self, _delay: Duration) {
    self.reload_scheduled.fetch_add(1, Ordering::SeqCst);
  }

  fn on_reload(&self) {
    self.reloads.fetch_add(1, Ordering::SeqCst);
  }
}

/// Default timeout for async tests (10 seconds).
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wrap an async test body with a timeout and status output.
///
/// Panics with a descriptive message if the timeout expires.
#[allow(clippy::panic)]
pub async fn with_timeout<F, T>(test_name: &str, f: F) -> T
where
  F: std::future::Future<Output = T>
{
  eprintln!("[TEST] Starting: {test_name}");
  let result = tokio::time::timeout(TEST_TIMEOUT, f).await.unwrap_or_else(|_| {
    panic!("[TEST] {test_name} timed out after {TEST_TIMEOUT:?} (possible deadlock)")
  });
  eprintln!("[TEST] Completed: {test_name}");
  result
}
