//! Timestamped copy of the allow-listed local values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unit of local sync. Overwritten wholesale on every capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
  /// Storage key -> raw value.
  pub data: BTreeMap<String, String>,
  /// Capture time (ISO 8601).
  pub timestamp: DateTime<Utc>
}

impl SyncSnapshot {
  /// Snapshot `data` as of now.
  #[must_use]
  pub fn now(data: BTreeMap<String, String>) -> Self {
    Self {
      data,
      timestamp: Utc::now()
    }
  }
}
