//! `LayerStatsService` tests: board caching, degradation, live progress.
//!
//! Run: `cargo test -p kurisync-core --test stats_service_tests`

#![allow(clippy::expect_used)]

use std::sync::Arc;

use kurisync_core::{
  BoardMetadata, DurableSettingsStore, KvStore, LayerStatsService, LocalMirrorStore, MemoryStore,
  StatCategory, StatValue, SyncConfig,
  test_utils::{MockBoardSource, with_timeout}
};

fn board() -> BoardMetadata {
  serde_json::from_value(serde_json::json!({
    "characterBoards": {
      "kommy": { "layer1": ["attack", "attack", "hp"], "layer2": ["crit"] },
      "butter": { "layer1": ["attack", "defense", "critResist"] }
    }
  }))
  .expect("board")
}

struct Setup {
  service: LayerStatsService<Arc<MockBoardSource>>,
  source: Arc<MockBoardSource>,
  local: Arc<MemoryStore>
}

fn setup(board: Option<BoardMetadata>, progress: Option<&str>) -> Setup {
  let config = SyncConfig::default();
  let local = Arc::new(MemoryStore::new());
  if let Some(p) = progress {
    local.set(&config.progress_key, p).expect("progress");
  }

  let mirror = Arc::new(LocalMirrorStore::new(local.clone(), &config));
  let settings = Arc::new(DurableSettingsStore::new(Arc::new(MemoryStore::new())));
  let source = Arc::new(MockBoardSource::new(board));

  Setup {
    service: LayerStatsService::new(source.clone(), mirror, settings),
    source,
    local
  }
}

#[tokio::test]
async fn test_layer_stats_with_board_and_progress() {
  with_timeout("test_layer_stats_with_board_and_progress", async {
    let s = setup(
      Some(board()),
      Some(r#"{"activatedCells": {"kommy_layer1_attack": true, "butter_layer1_attack": true, "kommy_layer1_hp": false}}"#)
    );

    let stats = s.service.layer_stats(1).await;
    let attack = stats.get(StatCategory::Attack);
    assert_eq!(attack.count, StatValue::Known(2));
    assert_eq!(attack.total, StatValue::Known(3));
    assert_eq!(attack.percentage, StatValue::Known(6));
    assert_eq!(stats.get(StatCategory::Hp).total, StatValue::Known(1));
    assert_eq!(stats.get(StatCategory::Crit).total, StatValue::Known(0));
  })
  .await;
}

#[tokio::test]
async fn test_board_fetched_once() {
  with_timeout("test_board_fetched_once", async {
    let s = setup(Some(board()), Some(r#"{"activatedCells": {}}"#));

    s.service.layer_stats(1).await;
    s.service.layer_stats(2).await;
    s.service.layer_stats(1).await;

    assert_eq!(s.source.calls(), 1);
  })
  .await;
}

#[tokio::test]
async fn test_failed_fetch_retried_next_time() {
  with_timeout("test_failed_fetch_retried_next_time", async {
    let s = setup(None, Some(r#"{"activatedCells": {"a_layer2_crit": true}}"#));

    let stats = s.service.layer_stats(2).await;
    assert_eq!(stats.get(StatCategory::Crit).total, StatValue::Unknown);
    assert_eq!(stats.get(StatCategory::Crit).count, StatValue::Known(1));

    s.source.set_board(Some(board()));
    let stats = s.service.layer_stats(2).await;
    assert_eq!(stats.get(StatCategory::Crit).total, StatValue::Known(1));
    assert_eq!(s.source.calls(), 2);
  })
  .await;
}

#[tokio::test]
async fn test_missing_progress_is_unknown() {
  with_timeout("test_missing_progress_is_unknown", async {
    let s = setup(Some(board()), None);

    let stats = s.service.layer_stats(1).await;
    for cat in StatCategory::ALL {
      assert_eq!(stats.get(cat).count, StatValue::Unknown);
      assert_eq!(stats.get(cat).percentage, StatValue::Unknown);
    }
  })
  .await;
}

#[tokio::test]
async fn test_progress_changes_are_picked_up() {
  with_timeout("test_progress_changes_are_picked_up", async {
    let s = setup(Some(board()), Some(r#"{"activatedCells": {}}"#));
    assert_eq!(
      s.service.layer_stats(1).await.get(StatCategory::Defense).count,
      StatValue::Known(0)
    );

    s.local
      .set(
        "trickcal_board_progress",
        r#"{"activatedCells": {"butter_layer1_defense": true}}"#
      )
      .expect("set");

    let defense = s.service.layer_stats(1).await.get(StatCategory::Defense);
    assert_eq!(defense.count, StatValue::Known(1));
    assert_eq!(defense.percentage, StatValue::Known(3));
  })
  .await;
}
