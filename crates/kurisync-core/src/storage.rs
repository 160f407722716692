//! Key/value storage backends.
//!
//! Both the page-local mirror and the durable settings are thin typed
//! layers over a [`KvStore`]. Hosts pick the backend: [`MemoryStore`] for
//! tests and short-lived sessions, [`JsonFileStore`] for anything that must
//! survive a restart.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard}
};

use tracing::{debug, warn};

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  /// Underlying file I/O failed.
  #[error("storage I/O: {0}")]
  Io(#[from] std::io::Error),
  /// A value (or the backing file) is not valid JSON.
  #[error("storage JSON: {0}")]
  Json(#[from] serde_json::Error)
}

/// String key/value store.
///
/// No transactionality: concurrent writers simply overwrite each other.
pub trait KvStore: Send + Sync + 'static {
  /// Read a value.
  fn get(&self, key: &str) -> Option<String>;

  /// Write a value.
  ///
  /// # Errors
  ///
  /// Returns an error if the backend cannot persist the value.
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Remove a value. Removing a missing key is not an error.
  ///
  /// # Errors
  ///
  /// Returns an error if the backend cannot persist the removal.
  fn remove(&self, key: &str) -> Result<(), StorageError>;

  /// All keys currently present.
  fn keys(&self) -> Vec<String>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  map: Mutex<BTreeMap<String, String>>
}

impl MemoryStore {
  /// Create an empty store.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a store pre-filled with `entries`.
  pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>
  {
    Self {
      map: Mutex::new(
        entries
          .into_iter()
          .map(|(k, v)| (k.into(), v.into()))
          .collect()
      )
    }
  }

  fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
    self.map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.lock().get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.lock().insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.lock().remove(key);
    Ok(())
  }

  fn keys(&self) -> Vec<String> {
    self.lock().keys().cloned().collect()
  }
}

/// Store persisted as a single JSON object on disk.
///
/// The file is shared with the host, which may rewrite it at any time, so
/// every read goes back to disk and every mutation is read-modify-write.
/// If the file turns unreadable, reads fall back to the last good contents
/// and writes fail rather than clobber it.
#[derive(Debug)]
pub struct JsonFileStore {
  path: PathBuf,
  /// Last contents successfully read or written; also serializes writers.
  last_good: Mutex<BTreeMap<String, String>>
}

impl JsonFileStore {
  /// Open (or lazily create) the store at `path`.
  ///
  /// A missing file starts an empty store; the file is created on the first write.
  ///
  /// # Errors
  ///
  /// Returns an error if the file exists but cannot be read or parsed.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
    let path = path.into();
    let map = read_file(&path)?;
    if !path.exists() {
      debug!(path = %path.display(), "store file missing, starting empty");
    }

    Ok(Self {
      path,
      last_good: Mutex::new(map)
    })
  }

  /// Path of the backing file.
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
    self
      .last_good
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  /// Current file contents, refreshing the last-good copy.
  fn load(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
    let mut guard = self.lock();
    match read_file(&self.path) {
      Ok(map) => *guard = map,
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "store file unreadable, using last good contents");
      }
    }
    guard
  }

  /// Apply `f` to the current file contents and write the result back.
  fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<(), StorageError> {
    let mut guard = self.lock();
    let mut map = read_file(&self.path)?;

    if f(&mut map) {
      self.persist(&map)?;
    }
    *guard = map;
    Ok(())
  }

  fn persist(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(map)?;
    std::fs::write(&self.path, json).inspect_err(|e| {
      warn!(path = %self.path.display(), error = %e, "failed to write store file");
    })?;
    Ok(())
  }
}

/// Read a store file; a missing or blank file is an empty store.
fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
  match std::fs::read_to_string(path) {
    Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
    Ok(text) => Ok(serde_json::from_str(&text)?),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
    Err(e) => Err(e.into())
  }
}

impl KvStore for JsonFileStore {
  fn get(&self, key: &str) -> Option<String> {
    self.load().get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.update(|map| {
      map.insert(key.to_string(), value.to_string());
      true
    })
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.update(|map| map.remove(key).is_some())
  }

  fn keys(&self) -> Vec<String> {
    self.load().keys().cloned().collect()
  }
}
