//! Remote basket trait: the transport seam between the engine and the
//! remote key-value service.
//!
//! Basket semantics are fixed by the service: POST replaces the whole
//! basket, PUT merges into an existing one, GET/DELETE do what they say.
//! Implementations are plain transport shims with no retry or backoff.

use std::future::Future;

use serde_json::Value;

/// Remote basket errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasketError {
  /// No (or a blank) store ID.
  #[error("remote store ID not set")]
  NotConfigured,
  /// The basket does not exist yet.
  #[error("basket not found")]
  NotFound,
  /// Non-2xx response.
  #[error("HTTP {status} {reason}")]
  Http {
    /// Status code.
    status: u16,
    /// Reason phrase or response body.
    reason: String
  },
  /// The request never got a response.
  #[error("transport: {0}")]
  Transport(String),
  /// The response body is not the expected JSON.
  #[error("decode: {0}")]
  Decode(String)
}

/// One named basket in one remote store.
pub trait RemoteBasket: Send + Sync + 'static {
  /// Fetch the basket contents.
  ///
  /// A missing basket yields [`BasketError::NotFound`].
  fn fetch(&self) -> impl Future<Output = Result<Value, BasketError>> + Send;

  /// Create the basket, or replace it wholesale.
  fn create_or_replace(&self, payload: &Value) -> impl Future<Output = Result<Value, BasketError>> + Send;

  /// Merge `payload` into an existing basket.
  fn merge(&self, payload: &Value) -> impl Future<Output = Result<Value, BasketError>> + Send;

  /// Delete the basket.
  fn delete(&self) -> impl Future<Output = Result<Value, BasketError>> + Send;
}

/// Builds a [`RemoteBasket`] from a store ID.
pub trait BasketConnector: Send + Sync + 'static {
  /// Basket type produced.
  type Basket: RemoteBasket;

  /// Connect to the basket of `store_id`.
  ///
  /// # Errors
  ///
  /// Returns [`BasketError::NotConfigured`] for a blank ID, or any error
  /// building the client.
  fn connect(&self, store_id: &str) -> Result<Self::Basket, BasketError>;
}
