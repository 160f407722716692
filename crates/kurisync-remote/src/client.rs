//! Pantry HTTP client.
//!
//! One client addresses one basket of one store:
//! `{base}/{store_id}/basket/{basket_name}`.

use kurisync_core::{BasketError, RemoteBasket};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::models::PantryDetails;

/// Pantry API client bound to one basket.
pub struct PantryClient {
  /// reqwest HTTP client.
  c: reqwest::Client,
  /// Store URL (`{base}/{store_id}`, without trailing `/`).
  store: String,
  /// Basket name.
  basket: String
}

impl PantryClient {
  /// Creates a client for `basket_name` in store `store_id`.
  ///
  /// # Errors
  ///
  /// Returns [`BasketError::NotConfigured`] for a blank store ID, or
  /// [`BasketError::Transport`] if the HTTP client cannot be built.
  pub fn new(base_url: &str, store_id: &str, basket_name: &str) -> Result<Self, BasketError> {
    let store_id = store_id.trim();
    if store_id.is_empty() {
      return Err(BasketError::NotConfigured);
    }

    let mut h = HeaderMap::new();
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let c = reqwest::Client::builder()
      .default_headers(h)
      .no_proxy()
      .build()
      .map_err(|e| BasketError::Transport(e.to_string()))?;

    Ok(Self {
      c,
      store: format!("{}/{store_id}", base_url.trim_end_matches('/')),
      basket: basket_name.to_string()
    })
  }

  /// Basket URL.
  #[must_use]
  pub fn basket_url(&self) -> String {
    format!("{}/basket/{}", self.store, self.basket)
  }

  /// Store details (name, usage, basket list).
  ///
  /// # Errors
  ///
  /// Returns a network/HTTP/deserialization error.
  pub async fn details(&self) -> Result<PantryDetails, BasketError> {
    let v = self.send_json(self.c.get(&self.store)).await?;
    Self::decode(v)
  }

  fn decode<T: DeserializeOwned>(v: Value) -> Result<T, BasketError> {
    serde_json::from_value(v).map_err(|e| BasketError::Decode(e.to_string()))
  }

  /// Execute a request and return the body.
  ///
  /// Success bodies that are not JSON (the service answers writes with
  /// plain text) come back as [`Value::String`].
  async fn send_json(&self, r: reqwest::RequestBuilder) -> Result<Value, BasketError> {
    let rq = r.build().map_err(|e| BasketError::Transport(e.to_string()))?;

    let start = std::time::Instant::now();
    let method = rq.method().clone();
    debug!(%method, url = %rq.url(), "pantry request");

    let resp = self
      .c
      .execute(rq)
      .await
      .map_err(|e| BasketError::Transport(e.to_string()))?;
    let st = resp.status();
    let txt = resp
      .text()
      .await
      .map_err(|e| BasketError::Transport(e.to_string()))?;

    debug!(
      status = st.as_u16(),
      ms = start.elapsed().as_millis(),
      bytes = txt.len(),
      "pantry response"
    );

    if tracing::enabled!(tracing::Level::TRACE) {
      let n = txt.char_indices().nth(4096).map_or(txt.len(), |(i, _)| i);
      trace!(status = st.as_u16(), body = %&txt[..n], "pantry response body");
    }

    if st.is_success() {
      if txt.trim().is_empty() {
        return Ok(Value::Null);
      }
      return Ok(serde_json::from_str(&txt).unwrap_or_else(|_| Value::String(txt)));
    }

    error!(
      %method,
      status = st.as_u16(),
      ms = start.elapsed().as_millis(),
      "pantry error"
    );

    if st == reqwest::StatusCode::NOT_FOUND {
      return Err(BasketError::NotFound);
    }

    Err(BasketError::Http {
      status: st.as_u16(),
      reason: st.canonical_reason().unwrap_or_default().to_string()
    })
  }
}

impl RemoteBasket for PantryClient {
  async fn fetch(&self) -> Result<Value, BasketError> {
    self.send_json(self.c.get(self.basket_url())).await
  }

  async fn create_or_replace(&self, payload: &Value) -> Result<Value, BasketError> {
    self
      .send_json(self.c.post(self.basket_url()).json(payload))
      .await
  }

  async fn merge(&self, payload: &Value) -> Result<Value, BasketError> {
    self
      .send_json(self.c.put(self.basket_url()).json(payload))
      .await
  }

  async fn delete(&self) -> Result<Value, BasketError> {
    self.send_json(self.c.delete(self.basket_url())).await
  }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
  use super::*;

  #[test]
  fn test_blank_store_id_rejected() {
    let r = PantryClient::new("https://getpantry.cloud/apiv1/pantry", "   ", "b");
    assert!(matches!(r, Err(BasketError::NotConfigured)));
  }

  #[test]
  fn test_basket_url() {
    let c = PantryClient::new("https://getpantry.cloud/apiv1/pantry/", " abc-123 ", "kuri.basket")
      .expect("client");
    assert_eq!(
      c.basket_url(),
      "https://getpantry.cloud/apiv1/pantry/abc-123/basket/kuri.basket"
    );
  }
}
