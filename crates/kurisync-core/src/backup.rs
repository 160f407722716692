//! JSON backup files.
//!
//! An export is the stored snapshot verbatim. An import accepts either such
//! a file or a bare `{key: value}` object.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use serde_json::Value;

/// Backup errors.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
  /// Not valid JSON.
  #[error("invalid JSON: {0}")]
  Json(#[from] serde_json::Error),
  /// Valid JSON, but the data is not an object.
  #[error("backup data must be a JSON object")]
  NotAnObject
}

/// A file ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
  /// Suggested file name.
  pub file_name: String,
  /// File contents (JSON).
  pub contents: String
}

/// `trickcal-backup.YYYY-MM-DD_HH:MM:SS.json`
#[must_use]
pub fn backup_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
  Tz::Offset: std::fmt::Display
{
  format!("trickcal-backup.{}.json", at.format("%Y-%m-%d_%H:%M:%S"))
}

/// Extract the storage map from an imported file.
///
/// Uses the `data` field when it holds an object, the whole document otherwise.
///
/// # Errors
///
/// Returns an error if the text is not JSON or the data is not an object.
pub fn parse_backup(text: &str) -> Result<BTreeMap<String, String>, BackupError> {
  let mut doc: Value = serde_json::from_str(text)?;

  let data = if doc.get("data").is_some_and(Value::is_object) {
    doc["data"].take()
  } else {
    doc
  };

  data_from_value(data)
}

/// Convert a JSON object into raw storage values.
///
/// Strings are kept as-is, `null` is skipped, anything else is stored as
/// its JSON text.
///
/// # Errors
///
/// Returns [`BackupError::NotAnObject`] for anything but an object.
pub fn data_from_value(value: Value) -> Result<BTreeMap<String, String>, BackupError> {
  let Value::Object(obj) = value else {
    return Err(BackupError::NotAnObject);
  };

  Ok(
    obj
      .into_iter()
      .filter_map(|(k, v)| match v {
        Value::Null => None,
        Value::String(s) => Some((k, s)),
        other => Some((k, other.to_string()))
      })
      .collect()
  )
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
  use chrono::Utc;

  use super::*;

  #[test]
  fn test_file_name_format() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().expect("date");
    assert_eq!(backup_file_name(&at), "trickcal-backup.2024-03-09_07:05:01.json");
  }

  #[test]
  fn test_parse_wrapped_and_bare() {
    let wrapped = r#"{"data": {"trickcal_theme": "dark"}, "timestamp": "2024-01-01T00:00:00Z"}"#;
    let bare = r#"{"trickcal_theme": "dark"}"#;

    let expected = BTreeMap::from([("trickcal_theme".to_string(), "dark".to_string())]);
    assert_eq!(parse_backup(wrapped).expect("wrapped"), expected);
    assert_eq!(parse_backup(bare).expect("bare"), expected);
  }

  #[test]
  fn test_parse_coerces_values() {
    let data = parse_backup(r#"{"a": 1, "b": {"x": true}, "c": null}"#).expect("parse");
    assert_eq!(data.get("a").map(String::as_str), Some("1"));
    assert_eq!(data.get("b").map(String::as_str), Some(r#"{"x":true}"#));
    assert!(!data.contains_key("c"));
  }

  #[test]
  fn test_parse_errors() {
    assert!(matches!(parse_backup("{nope"), Err(BackupError::Json(_))));
    assert!(matches!(parse_backup("[1, 2]"), Err(BackupError::NotAnObject)));
  }
}
