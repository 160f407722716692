//! Typed results of engine operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
  /// Operation succeeded.
  Success,
  /// Informational (e.g. scheduler started).
  Info,
  /// Nothing done, but not a failure (not configured, no data yet).
  Warning,
  /// Operation failed.
  Error
}

/// What an operation did, as a message the UI can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
  /// Severity.
  pub kind: OutcomeKind,
  /// Human-readable message.
  pub message: String
}

impl Outcome {
  /// Success.
  pub fn success(message: impl Into<String>) -> Self {
    Self::new(OutcomeKind::Success, message)
  }

  /// Info.
  pub fn info(message: impl Into<String>) -> Self {
    Self::new(OutcomeKind::Info, message)
  }

  /// Warning.
  pub fn warning(message: impl Into<String>) -> Self {
    Self::new(OutcomeKind::Warning, message)
  }

  /// Error.
  pub fn error(message: impl Into<String>) -> Self {
    Self::new(OutcomeKind::Error, message)
  }

  fn new(kind: OutcomeKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into()
    }
  }

  /// Did the operation fail?
  #[must_use]
  pub fn is_error(&self) -> bool {
    self.kind == OutcomeKind::Error
  }

  /// Did the operation succeed?
  #[must_use]
  pub fn is_success(&self) -> bool {
    self.kind == OutcomeKind::Success
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{:?}] {}", self.kind, self.message)
  }
}

/// Which side a status indicator tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTarget {
  /// Local snapshot.
  Local,
  /// Remote basket.
  Remote
}

/// Indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
  /// Nothing running.
  Idle,
  /// Request in flight.
  Syncing,
  /// Last run succeeded.
  Success,
  /// Last run failed.
  Error
}

impl SyncStatus {
  /// Success and error revert to idle after a delay.
  #[must_use]
  pub const fn is_terminal(self) -> bool {
    matches!(self, Self::Success | Self::Error)
  }
}
