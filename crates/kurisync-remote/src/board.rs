//! Board layout fetched over HTTP.

use std::time::Duration;

use anyhow::Context;
use kurisync_core::{BoardMetadata, BoardSource};
use tracing::debug;

/// [`BoardSource`] reading the board layout JSON from a URL.
pub struct HttpBoardSource {
  c: reqwest::Client,
  url: String
}

impl HttpBoardSource {
  /// Creates a source for `url`.
  ///
  /// # Errors
  ///
  /// Returns an error if the URL is empty or the HTTP client cannot be built.
  pub fn new(url: &str) -> anyhow::Result<Self> {
    if url.trim().is_empty() {
      anyhow::bail!("board data URL must not be empty");
    }

    Ok(Self {
      c: reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(30))
        .build()?,
      url: url.trim().to_string()
    })
  }
}

impl BoardSource for HttpBoardSource {
  async fn fetch_board(&self) -> anyhow::Result<BoardMetadata> {
    let start = std::time::Instant::now();
    debug!(url = %self.url, "board request");

    let resp = self
      .c
      .get(&self.url)
      .send()
      .await
      .with_context(|| format!("GET {}", self.url))?;
    let st = resp.status();
    if !st.is_success() {
      anyhow::bail!("HTTP {st}");
    }

    let board: BoardMetadata = resp.json().await.context("board data JSON")?;
    debug!(
      status = st.as_u16(),
      ms = start.elapsed().as_millis(),
      characters = board.character_boards.len(),
      "board response"
    );
    Ok(board)
  }
}
