//! kurisync-remote: Pantry transport for `KuriSync`.
//!
//! Implements `kurisync_core::BasketConnector` over the Pantry HTTP API and
//! `kurisync_core::BoardSource` over plain HTTP.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod board;
pub mod client;
pub mod models;

pub use board::HttpBoardSource;
pub use client::PantryClient;
pub use models::{BasketSummary, PantryDetails};

use kurisync_core::{AppConfig, BasketConnector, BasketError};

/// Builds a [`PantryClient`] per store ID, all on the same basket.
#[derive(Debug, Clone)]
pub struct PantryConnector {
  base_url: String,
  basket_name: String
}

impl PantryConnector {
  /// Connector for `basket_name` under `base_url`.
  #[must_use]
  pub fn new(base_url: &str, basket_name: &str) -> Self {
    Self {
      base_url: base_url.to_string(),
      basket_name: basket_name.to_string()
    }
  }

  /// Connector from application config.
  #[must_use]
  pub fn from_config(config: &AppConfig) -> Self {
    Self::new(&config.remote.pantry_base_url, &config.sync.basket_name)
  }
}

impl BasketConnector for PantryConnector {
  type Basket = PantryClient;

  fn connect(&self, store_id: &str) -> Result<PantryClient, BasketError> {
    PantryClient::new(&self.base_url, store_id, &self.basket_name)
  }
}
