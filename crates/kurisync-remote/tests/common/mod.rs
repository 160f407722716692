//! Mock Pantry API server on axum.
//!
//! Provides `FakePantryApi::spawn()`, which starts an HTTP server on a random port.

#![allow(clippy::expect_used, dead_code)]

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicU16, Ordering}
  }
};

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::get
};
use serde_json::Value;
use tokio::sync::RwLock;

/// Store ID registered by `spawn`.
pub const STORE_ID: &str = "test-store";

/// Internal state of the fake API.
#[derive(Debug, Default)]
pub struct FakeState {
  /// Baskets by (store, name).
  pub baskets: RwLock<HashMap<(String, String), Value>>,
  /// Board layout served at `/board/data.json` (500 when unset).
  pub board: RwLock<Option<Value>>,
  /// Request log: `METHOD path`.
  pub requests: RwLock<Vec<String>>,
  /// Status forced on every basket request (0 = off).
  fail_status: AtomicU16
}

impl FakeState {
  /// Put a basket.
  pub async fn put_basket(&self, name: &str, contents: Value) {
    self
      .baskets
      .write()
      .await
      .insert((STORE_ID.to_string(), name.to_string()), contents);
  }

  /// Read a basket.
  pub async fn basket(&self, name: &str) -> Option<Value> {
    self
      .baskets
      .read()
      .await
      .get(&(STORE_ID.to_string(), name.to_string()))
      .cloned()
  }

  /// Serve `board` at `/board/data.json`.
  pub async fn set_board(&self, board: Value) {
    *self.board.write().await = Some(board);
  }

  /// Answer every basket request with `status`.
  pub fn fail_with(&self, status: u16) {
    self.fail_status.store(status, Ordering::SeqCst);
  }

  /// Logged requests.
  pub async fn requests(&self) -> Vec<String> {
    self.requests.read().await.clone()
  }

  async fn log(&self, method: &str, path: String) {
    self.requests.write().await.push(format!("{method} {path}"));
  }

  fn forced_failure(&self) -> Option<Response> {
    let st = self.fail_status.load(Ordering::SeqCst);
    (st != 0).then(|| {
      StatusCode::from_u16(st)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
    })
  }
}

/// Fake Pantry API: start and get base URL + state.
pub struct FakePantryApi;

impl FakePantryApi {
  /// Start a fake API server on a random port.
  ///
  /// Returns the server root; the Pantry base URL is `{root}/apiv1/pantry`.
  pub async fn spawn() -> (String, Arc<FakeState>) {
    let state = Arc::new(FakeState::default());

    let app = Router::new()
      .route("/apiv1/pantry/:id", get(handle_details))
      .route(
        "/apiv1/pantry/:id/basket/:name",
        get(handle_get)
          .post(handle_create)
          .put(handle_merge)
          .delete(handle_delete)
      )
      .route("/board/data.json", get(handle_board))
      .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let root = format!("http://{addr}");

    tokio::spawn(async move {
      axum::serve(listener, app).await.expect("serve");
    });

    // Wait for the server to start.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (root, state)
  }
}

/// Pantry base URL for a server root.
pub fn pantry_base(root: &str) -> String {
  format!("{root}/apiv1/pantry")
}

type Shared = State<Arc<FakeState>>;

async fn handle_details(State(s): Shared, Path(id): Path<String>) -> Response {
  s.log("GET", format!("/{id}")).await;
  if id != STORE_ID {
    return (StatusCode::BAD_REQUEST, "Could not get pantry").into_response();
  }

  let baskets: Vec<Value> = s
    .baskets
    .read()
    .await
    .keys()
    .filter(|(store, _)| store == STORE_ID)
    .map(|(_, name)| serde_json::json!({ "name": name, "ttl": 2_592_000 }))
    .collect();

  Json(serde_json::json!({
    "name": "fake pantry",
    "description": "",
    "errors": [],
    "notifications": false,
    "percentFull": 0,
    "baskets": baskets
  }))
  .into_response()
}

async fn handle_get(State(s): Shared, Path((id, name)): Path<(String, String)>) -> Response {
  s.log("GET", format!("/{id}/basket/{name}")).await;
  if let Some(r) = s.forced_failure() {
    return r;
  }

  match s.baskets.read().await.get(&(id, name)) {
    Some(v) => Json(v.clone()).into_response(),
    None => StatusCode::NOT_FOUND.into_response()
  }
}

async fn handle_create(
  State(s): Shared,
  Path((id, name)): Path<(String, String)>,
  Json(body): Json<Value>
) -> Response {
  s.log("POST", format!("/{id}/basket/{name}")).await;
  if let Some(r) = s.forced_failure() {
    return r;
  }

  let msg = format!("Your Pantry was updated with basket: {name}!");
  s.baskets.write().await.insert((id, name), body);
  msg.into_response()
}

async fn handle_merge(
  State(s): Shared,
  Path((id, name)): Path<(String, String)>,
  Json(body): Json<Value>
) -> Response {
  s.log("PUT", format!("/{id}/basket/{name}")).await;
  if let Some(r) = s.forced_failure() {
    return r;
  }

  let mut baskets = s.baskets.write().await;
  let Some(Value::Object(existing)) = baskets.get_mut(&(id, name)) else {
    return StatusCode::NOT_FOUND.into_response();
  };
  if let Value::Object(incoming) = body {
    existing.extend(incoming);
  }
  Json(Value::Object(existing.clone())).into_response()
}

async fn handle_delete(State(s): Shared, Path((id, name)): Path<(String, String)>) -> Response {
  s.log("DELETE", format!("/{id}/basket/{name}")).await;
  if let Some(r) = s.forced_failure() {
    return r;
  }

  let removed = s.baskets.write().await.remove(&(id, name.clone()));
  match removed {
    Some(_) => format!("{name} was removed from your Pantry!").into_response(),
    None => StatusCode::NOT_FOUND.into_response()
  }
}

async fn handle_board(State(s): Shared) -> impl IntoResponse {
  match s.board.read().await.clone() {
    Some(b) => Json(b).into_response(),
    None => StatusCode::INTERNAL_SERVER_ERROR.into_response()
  }
}
