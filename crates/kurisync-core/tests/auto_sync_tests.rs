//! Auto-sync scheduler tests: timer uniqueness, tick ordering, stop, resume.
//!
//! Time is paused; `sleep` advances the virtual clock.
//!
//! Run: `cargo test -p kurisync-core --test auto_sync_tests`

#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use kurisync_core::{
  DurableSettingsStore, KvStore, LocalMirrorStore, MemoryStore, SyncConfig, SyncEngine,
  basket::BasketError,
  settings::keys,
  test_utils::{MockConnector, TestEventHandler}
};

const LOCAL_OK: &str = "Local sync successful";
const ONLINE_OK: &str = "Online sync successful";

struct Setup {
  engine: Arc<SyncEngine<MockConnector>>,
  settings_store: Arc<MemoryStore>,
  events: Arc<TestEventHandler>,
  connector: MockConnector
}

/// Engine over in-memory stores; `online` also configures a store ID.
fn setup(online: bool) -> Setup {
  let config = SyncConfig::default();
  let local = Arc::new(MemoryStore::with_entries([("trickcal_theme", "dark")]));
  let settings_store = Arc::new(MemoryStore::new());
  if online {
    settings_store
      .set(keys::REMOTE_STORE_ID, "\"pantry-1\"")
      .expect("id");
    settings_store
      .set(keys::ONLINE_SYNC_ENABLED, "true")
      .expect("online");
  }

  let events = Arc::new(TestEventHandler::new());
  let mirror = Arc::new(LocalMirrorStore::new(local, &config));
  let settings = Arc::new(DurableSettingsStore::new(settings_store.clone()));
  let connector = MockConnector::new();

  let engine = SyncEngine::new(config, mirror, settings, connector.clone(), events.clone());
  engine.resume();

  Setup {
    engine,
    settings_store,
    events,
    connector
  }
}

async fn advance(secs: u64) {
  tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_period() {
  let s = setup(false);
  s.engine.start_auto_sync(10);

  advance(9).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 0);

  advance(2).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_leaves_one_timer() {
  let s = setup(false);
  s.engine.start_auto_sync(10);
  s.engine.start_auto_sync(10);

  assert!(s.engine.is_auto_sync_active());
  assert_eq!(s.engine.auto_sync_interval(), Some(Duration::from_secs(10)));

  advance(35).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 3, "one sync per period");
}

#[tokio::test(start_paused = true)]
async fn test_restart_with_new_interval() {
  let s = setup(false);
  s.engine.start_auto_sync(10);
  s.engine.start_auto_sync(60);

  advance(59).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 0);
  advance(2).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 1);
  assert_eq!(s.settings_store.get(keys::AUTO_SYNC_INTERVAL).as_deref(), Some("60"));
}

#[tokio::test(start_paused = true)]
async fn test_tick_pushes_after_local_when_online() {
  let s = setup(true);
  assert!(s.engine.is_remote_configured());
  s.engine.start_auto_sync(10);

  advance(11).await;

  let outcomes: Vec<String> = s.events.outcomes().into_iter().map(|o| o.message).collect();
  let local = outcomes.iter().position(|m| m.contains(LOCAL_OK)).expect("local");
  let online = outcomes.iter().position(|m| m.contains(ONLINE_OK)).expect("online");
  assert!(local < online, "local capture precedes push: {outcomes:?}");
  assert_eq!(s.connector.basket().create_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_push_when_online_disabled() {
  let s = setup(true);
  s.settings_store
    .set(keys::ONLINE_SYNC_ENABLED, "false")
    .expect("set");
  s.engine.start_auto_sync(10);

  advance(25).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 2);
  assert_eq!(s.connector.basket().create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_does_not_stop_ticks() {
  let s = setup(true);
  s.connector.basket().fail_with(BasketError::Transport("connection refused".to_string()));
  s.engine.start_auto_sync(10);

  advance(35).await;
  assert_eq!(s.connector.basket().create_calls(), 3);
  assert_eq!(s.events.outcome_count("Online sync failed"), 3);
  assert!(s.engine.is_auto_sync_active());
}

#[tokio::test(start_paused = true)]
async fn test_slow_push_delays_but_keeps_ticking() {
  let s = setup(true);
  s.connector.basket().set_delay(Duration::from_secs(15));
  s.engine.start_auto_sync(10);

  advance(50).await;
  assert!(s.connector.basket().create_calls() >= 2);
  assert!(s.engine.is_auto_sync_active());
}

#[tokio::test(start_paused = true)]
async fn test_stop_clears_timer_and_flag() {
  let s = setup(false);
  s.engine.start_auto_sync(10);
  assert_eq!(s.settings_store.get(keys::AUTO_SYNC_ENABLED).as_deref(), Some("true"));

  advance(11).await;
  s.engine.stop_auto_sync();
  advance(30).await;

  assert!(!s.engine.is_auto_sync_active());
  assert_eq!(s.events.outcome_count(LOCAL_OK), 1);
  assert_eq!(s.settings_store.get(keys::AUTO_SYNC_ENABLED), None);
}

#[tokio::test(start_paused = true)]
async fn test_resume_restarts_enabled_auto_sync() {
  let s = setup(false);
  s.settings_store.set(keys::AUTO_SYNC_ENABLED, "true").expect("set");
  s.settings_store.set(keys::AUTO_SYNC_INTERVAL, "20").expect("set");

  s.engine.resume();
  s.engine.resume();
  assert!(s.engine.is_auto_sync_active());

  advance(41).await;
  assert_eq!(s.events.outcome_count(LOCAL_OK), 2);
}

#[tokio::test(start_paused = true)]
async fn test_below_minimum_interval_is_clamped() {
  let s = setup(false);
  s.engine.start_auto_sync(1);
  assert_eq!(s.engine.auto_sync_interval(), Some(Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn test_zero_minimum_still_ticks() {
  let config = SyncConfig {
    min_interval_secs: 0,
    ..SyncConfig::default()
  };
  let local = Arc::new(MemoryStore::with_entries([("trickcal_theme", "dark")]));
  let events = Arc::new(TestEventHandler::new());
  let mirror = Arc::new(LocalMirrorStore::new(local, &config));
  let settings = Arc::new(DurableSettingsStore::new(Arc::new(MemoryStore::new())));
  let engine = SyncEngine::new(config, mirror, settings, MockConnector::new(), events.clone());

  let outcome = engine.start_auto_sync(0);
  assert_eq!(outcome.message, "Auto-sync started (1s)");
  assert_eq!(engine.auto_sync_interval(), Some(Duration::from_secs(1)));

  advance(3).await;
  assert!(engine.is_auto_sync_active());
  assert!(events.outcome_count(LOCAL_OK) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_engine_ends_timer() {
  let s = setup(false);
  s.engine.start_auto_sync(10);
  let events = s.events.clone();
  drop(s);

  advance(30).await;
  assert_eq!(events.outcome_count(LOCAL_OK), 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_reverts_after_delay() {
  use kurisync_core::{SyncStatus, SyncTarget};

  let s = setup(false);
  s.engine.sync_local();
  assert_eq!(s.engine.status(SyncTarget::Local), SyncStatus::Success);

  advance(4).await;
  assert_eq!(s.engine.status(SyncTarget::Local), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_reload_fires_after_delay() {
  let s = setup(false);
  s.engine.sync_local();
  s.engine.restore_from_local_snapshot();
  assert_eq!(s.events.reload_scheduled_count(), 1);
  assert_eq!(s.events.reload_count(), 0);

  advance(2).await;
  assert_eq!(s.events.reload_count(), 1);
}
