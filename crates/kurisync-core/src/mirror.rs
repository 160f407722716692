//! Page-local storage mirror restricted to the allow-list.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex}
};

use tracing::{debug, warn};

use crate::{
  config::SyncConfig,
  stats::BoardProgress,
  storage::{KvStore, StorageError}
};

/// Allow-listed view over the host page's local storage.
///
/// The host page mutates the same keys concurrently, so every read is a
/// fresh snapshot and nothing is locked across calls.
pub struct LocalMirrorStore {
  store: Arc<dyn KvStore>,
  keys: Vec<String>,
  progress_key: String,
  /// Last raw progress string and its parsed form.
  progress_cache: Mutex<Option<(String, Arc<BoardProgress>)>>
}

impl LocalMirrorStore {
  /// Wrap `store` with the allow-list from `config`.
  pub fn new(store: Arc<dyn KvStore>, config: &SyncConfig) -> Self {
    Self {
      store,
      keys: config.storage_keys.clone(),
      progress_key: config.progress_key.clone(),
      progress_cache: Mutex::new(None)
    }
  }

  /// The allow-list.
  #[must_use]
  pub fn allowed_keys(&self) -> &[String] {
    &self.keys
  }

  /// Is `key` on the allow-list?
  #[must_use]
  pub fn is_allowed(&self, key: &str) -> bool {
    self.keys.iter().any(|k| k == key)
  }

  /// Allow-listed keys that are currently present.
  #[must_use]
  pub fn read_all(&self) -> BTreeMap<String, String> {
    self
      .keys
      .iter()
      .filter_map(|k| self.store.get(k).map(|v| (k.clone(), v)))
      .collect()
  }

  /// Write allow-listed entries of `data`; other keys are dropped.
  ///
  /// Keys absent from `data` are left as they are.
  ///
  /// # Errors
  ///
  /// Returns the first storage error.
  pub fn write_all(&self, data: &BTreeMap<String, String>) -> Result<(), StorageError> {
    let mut written = 0usize;
    for (k, v) in data {
      if self.is_allowed(k) {
        self.store.set(k, v)?;
        written += 1;
      } else {
        debug!(key = %k, "dropping key outside allow-list");
      }
    }
    debug!(written, "mirror written");
    Ok(())
  }

  /// Remove every allow-listed key.
  ///
  /// # Errors
  ///
  /// Returns the first storage error.
  pub fn clear_all(&self) -> Result<(), StorageError> {
    for k in &self.keys {
      self.store.remove(k)?;
    }
    self.invalidate_progress_cache();
    Ok(())
  }

  /// Board progress parsed from the progress key.
  ///
  /// Returns `None` when the key is missing or holds malformed JSON.
  /// The parsed value is reused while the raw string is unchanged.
  #[must_use]
  pub fn board_progress(&self) -> Option<Arc<BoardProgress>> {
    let raw = self.store.get(&self.progress_key)?;

    let mut cache = self
      .progress_cache
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);

    if let Some((cached_raw, parsed)) = cache.as_ref()
      && *cached_raw == raw
    {
      return Some(Arc::clone(parsed));
    }

    match serde_json::from_str::<BoardProgress>(&raw) {
      Ok(progress) => {
        let progress = Arc::new(progress);
        *cache = Some((raw, Arc::clone(&progress)));
        Some(progress)
      }
      Err(e) => {
        warn!(error = %e, "failed to parse board progress");
        *cache = None;
        None
      }
    }
  }

  /// Drop the cached board progress.
  pub fn invalidate_progress_cache(&self) {
    *self
      .progress_cache
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
  }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;

  fn mirror_with(entries: &[(&str, &str)]) -> (LocalMirrorStore, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
    let mirror = LocalMirrorStore::new(store.clone(), &SyncConfig::default());
    (mirror, store)
  }

  fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
      .iter()
      .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
      .collect()
  }

  #[test]
  fn test_read_all_only_allow_listed() {
    let (mirror, _store) = mirror_with(&[
      ("trickcal_theme", "dark"),
      ("trickcal_language", "ko"),
      ("unrelated", "x")
    ]);

    assert_eq!(
      mirror.read_all(),
      map(&[("trickcal_language", "ko"), ("trickcal_theme", "dark")])
    );
  }

  #[test]
  fn test_write_all_drops_foreign_and_keeps_absent() {
    let (mirror, store) = mirror_with(&[("trickcal_language", "ko")]);

    mirror
      .write_all(&map(&[("trickcal_theme", "light"), ("evil", "1")]))
      .expect("write");

    assert_eq!(store.get("trickcal_theme").as_deref(), Some("light"));
    assert_eq!(store.get("trickcal_language").as_deref(), Some("ko"));
    assert_eq!(store.get("evil"), None);
  }

  #[test]
  fn test_write_all_read_all_idempotent() {
    let (mirror, _store) = mirror_with(&[
      ("trickcal_theme", "dark"),
      ("trickcal_board_progress", "{}")
    ]);

    let before = mirror.read_all();
    mirror.write_all(&before).expect("write");
    mirror.write_all(&before).expect("write again");
    assert_eq!(mirror.read_all(), before);
  }

  #[test]
  fn test_clear_then_write_does_not_resurrect() {
    let (mirror, store) = mirror_with(&[
      ("trickcal_theme", "dark"),
      ("trickcal_language", "ko"),
      ("unrelated", "stays")
    ]);

    mirror.clear_all().expect("clear");
    mirror.write_all(&map(&[("trickcal_theme", "light")])).expect("write");

    assert_eq!(mirror.read_all(), map(&[("trickcal_theme", "light")]));
    assert_eq!(store.get("unrelated").as_deref(), Some("stays"));
  }

  #[test]
  fn test_board_progress_cached_until_raw_changes() {
    let (mirror, store) = mirror_with(&[(
      "trickcal_board_progress",
      r#"{"activatedCells": {"a_layer1_hp": true}}"#
    )]);

    let first = mirror.board_progress().expect("progress");
    let second = mirror.board_progress().expect("progress");
    assert!(Arc::ptr_eq(&first, &second));

    store
      .set("trickcal_board_progress", r#"{"activatedCells": {}}"#)
      .expect("set");
    let third = mirror.board_progress().expect("progress");
    assert!(!Arc::ptr_eq(&first, &third));
    assert!(third.activated_cells.is_empty());
  }

  #[test]
  fn test_board_progress_malformed_is_none() {
    let (mirror, _store) = mirror_with(&[("trickcal_board_progress", "{broken")]);
    assert!(mirror.board_progress().is_none());
  }

  #[test]
  fn test_read_all_follows_host_file_changes() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let path = tmp.path().join("local_storage.json");
    std::fs::write(&path, r#"{"trickcal_theme":"dark"}"#).expect("write");

    let store = Arc::new(crate::storage::JsonFileStore::open(&path).expect("open"));
    let mirror = LocalMirrorStore::new(store, &SyncConfig::default());
    assert_eq!(mirror.read_all(), map(&[("trickcal_theme", "dark")]));

    std::fs::write(&path, r#"{"trickcal_theme":"light","trickcal_language":"en"}"#)
      .expect("host write");

    assert_eq!(
      mirror.read_all(),
      map(&[("trickcal_language", "en"), ("trickcal_theme", "light")])
    );
  }
}
