//! Pantry API models.

use serde::{Deserialize, Serialize};

/// Store details returned by `GET /pantry/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryDetails {
  /// Store name.
  #[serde(default)]
  pub name: String,
  /// Store description.
  #[serde(default)]
  pub description: String,
  /// Recent service errors.
  #[serde(default)]
  pub errors: Vec<String>,
  /// Whether e-mail notifications are on.
  #[serde(default)]
  pub notifications: bool,
  /// Storage used, in percent.
  #[serde(default)]
  pub percent_full: f64,
  /// Baskets in the store.
  #[serde(default)]
  pub baskets: Vec<BasketSummary>
}

/// One basket in [`PantryDetails`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasketSummary {
  /// Basket name.
  pub name: String,
  /// Seconds until the basket expires.
  #[serde(default)]
  pub ttl: Option<i64>
}
