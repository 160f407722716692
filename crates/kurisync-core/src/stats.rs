//! Layer bonus stats derived from board progress.
//!
//! [`compute_stats`] is pure. [`LayerStatsService`] wires it to the local
//! mirror, the stored multipliers and the board layout, which is fetched
//! once per session and cached.

use std::{
  collections::{BTreeMap, HashMap},
  fmt,
  future::Future,
  sync::{Arc, Mutex}
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{mirror::LocalMirrorStore, settings::DurableSettingsStore};

/// Stat category a board cell grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatCategory {
  /// Attack.
  Attack,
  /// Critical.
  Crit,
  /// HP.
  Hp,
  /// Defense.
  Defense,
  /// Critical resistance.
  CritResist
}

impl StatCategory {
  /// Every category, in display order.
  pub const ALL: [Self; 5] = [
    Self::Attack,
    Self::Crit,
    Self::Hp,
    Self::CritResist,
    Self::Defense
  ];

  /// Parse the tag used in cell keys and board metadata.
  #[must_use]
  pub fn from_tag(tag: &str) -> Option<Self> {
    match tag {
      "attack" => Some(Self::Attack),
      "crit" => Some(Self::Crit),
      "hp" => Some(Self::Hp),
      "defense" => Some(Self::Defense),
      "critResist" => Some(Self::CritResist),
      _ => None
    }
  }

  /// Human-readable label.
  #[must_use]
  pub const fn label(self) -> &'static str {
    match self {
      Self::Attack => "Attack",
      Self::Crit => "Critical",
      Self::Hp => "HP",
      Self::Defense => "Defense",
      Self::CritResist => "Crit Resist"
    }
  }
}

/// Board progress as stored by the host site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardProgress {
  /// Cell key -> activated flag. Only literal `true` counts.
  #[serde(default)]
  pub activated_cells: BTreeMap<String, Value>
}

/// Static board layout: character -> layer -> cell tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMetadata {
  /// Per-character boards. Non-array layer entries are ignored.
  #[serde(default)]
  pub character_boards: BTreeMap<String, BTreeMap<String, Value>>
}

/// Cell count per category.
pub type CategoryTotals = BTreeMap<StatCategory, u32>;

impl BoardMetadata {
  /// Count cells per category on `layer` across all characters.
  #[must_use]
  pub fn layer_totals(&self, layer: u32) -> CategoryTotals {
    let layer_key = layer_key(layer);
    let mut totals: CategoryTotals = StatCategory::ALL.iter().map(|c| (*c, 0)).collect();

    let tags = self
      .character_boards
      .values()
      .filter_map(|character| character.get(&layer_key))
      .filter_map(Value::as_array)
      .flatten()
      .filter_map(Value::as_str);

    for tag in tags {
      if let Some(cat) = StatCategory::from_tag(tag) {
        *totals.entry(cat).or_default() += 1;
      }
    }

    totals
  }
}

/// Per-layer stat multipliers, keyed `layer1`, `layer2`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMultipliers(pub BTreeMap<String, BTreeMap<StatCategory, f64>>);

impl Default for LayerMultipliers {
  fn default() -> Self {
    let table = [("layer1", 3.0), ("layer2", 4.0), ("layer3", 5.0)]
      .into_iter()
      .map(|(layer, m)| {
        (
          layer.to_string(),
          StatCategory::ALL.iter().map(|c| (*c, m)).collect()
        )
      })
      .collect();
    Self(table)
  }
}

impl LayerMultipliers {
  /// Multiplier for `category` on `layer`.
  ///
  /// Falls back to the default table when the layer (or the category within
  /// it) is not overridden, and to 0 when the default table has nothing either.
  #[must_use]
  pub fn get(&self, layer: u32, category: StatCategory) -> f64 {
    let key = layer_key(layer);
    let lookup = |m: &Self| m.0.get(&key).and_then(|l| l.get(&category)).copied();

    lookup(self)
      .or_else(|| lookup(&Self::default()))
      .unwrap_or_else(|| {
        debug!(layer, ?category, "no multiplier, using 0");
        0.0
      })
  }
}

/// A stat figure, or unknown when its source data is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
  /// Known value.
  Known(i64),
  /// No data.
  Unknown
}

impl fmt::Display for StatValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Known(v) => write!(f, "{v}"),
      Self::Unknown => f.write_str("?")
    }
  }
}

/// Stats of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLine {
  /// Activated cells.
  pub count: StatValue,
  /// Cells on the layer.
  pub total: StatValue,
  /// Bonus percentage.
  pub percentage: StatValue
}

impl StatLine {
  const UNKNOWN: Self = Self {
    count: StatValue::Unknown,
    total: StatValue::Unknown,
    percentage: StatValue::Unknown
  };
}

/// Stats of every category on one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStats(pub BTreeMap<StatCategory, StatLine>);

impl LayerStats {
  /// Stats of `category`.
  #[must_use]
  pub fn get(&self, category: StatCategory) -> StatLine {
    self.0.get(&category).copied().unwrap_or(StatLine::UNKNOWN)
  }
}

impl fmt::Display for LayerStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for cat in StatCategory::ALL {
      let line = self.get(cat);
      writeln!(
        f,
        "{:<12} +{}% [{}/{}]",
        cat.label(),
        line.percentage,
        line.count,
        line.total
      )?;
    }
    Ok(())
  }
}

fn layer_key(layer: u32) -> String {
  format!("layer{layer}")
}

/// Split `<anything>_<layer>_<category>`; keys with fewer segments yield `None`.
fn parse_cell_key(key: &str) -> Option<(&str, StatCategory)> {
  let mut parts = key.rsplitn(3, '_');
  let category = parts.next()?;
  let layer = parts.next()?;
  parts.next()?;
  Some((layer, StatCategory::from_tag(category)?))
}

/// Compute layer stats.
///
/// Without progress every field is unknown. Without board metadata the
/// totals are unknown but counts and percentages are still computed.
#[must_use]
pub fn compute_stats(
  layer: u32,
  progress: Option<&BoardProgress>,
  multipliers: &LayerMultipliers,
  board: Option<&BoardMetadata>
) -> LayerStats {
  let totals = board.map(|b| b.layer_totals(layer));
  compute_with_totals(layer, progress, multipliers, totals.as_ref())
}

#[allow(clippy::cast_possible_truncation)]
fn compute_with_totals(
  layer: u32,
  progress: Option<&BoardProgress>,
  multipliers: &LayerMultipliers,
  totals: Option<&CategoryTotals>
) -> LayerStats {
  let Some(progress) = progress else {
    return LayerStats(StatCategory::ALL.iter().map(|c| (*c, StatLine::UNKNOWN)).collect());
  };

  let layer_key = layer_key(layer);
  let mut counts: BTreeMap<StatCategory, u32> = BTreeMap::new();

  for (key, active) in &progress.activated_cells {
    if *active != Value::Bool(true) {
      continue;
    }
    if let Some((cell_layer, cat)) = parse_cell_key(key)
      && cell_layer == layer_key
    {
      *counts.entry(cat).or_default() += 1;
    }
  }

  let lines = StatCategory::ALL
    .iter()
    .map(|&cat| {
      let count = counts.get(&cat).copied().unwrap_or(0);
      let percentage = (f64::from(count) * multipliers.get(layer, cat)).floor() as i64;
      let total = totals
        .and_then(|t| t.get(&cat))
        .map_or(StatValue::Unknown, |t| StatValue::Known(i64::from(*t)));

      (
        cat,
        StatLine {
          count: StatValue::Known(i64::from(count)),
          total,
          percentage: StatValue::Known(percentage)
        }
      )
    })
    .collect();

  LayerStats(lines)
}

/// Source of the static board layout.
pub trait BoardSource: Send + Sync + 'static {
  /// Fetch the board layout.
  fn fetch_board(&self) -> impl Future<Output = anyhow::Result<BoardMetadata>> + Send;
}

/// Layer stats over live storage.
///
/// The board layout is fetched on first use and kept for the lifetime of
/// the service; a failed fetch is not cached.
pub struct LayerStatsService<S: BoardSource> {
  source: S,
  mirror: Arc<LocalMirrorStore>,
  settings: Arc<DurableSettingsStore>,
  board: OnceCell<Arc<BoardMetadata>>,
  totals: Mutex<HashMap<u32, CategoryTotals>>
}

impl<S: BoardSource> LayerStatsService<S> {
  /// Create the service.
  pub fn new(source: S, mirror: Arc<LocalMirrorStore>, settings: Arc<DurableSettingsStore>) -> Self {
    Self {
      source,
      mirror,
      settings,
      board: OnceCell::new(),
      totals: Mutex::new(HashMap::new())
    }
  }

  /// Board layout, fetching it on first call.
  pub async fn board(&self) -> Option<Arc<BoardMetadata>> {
    let res = self
      .board
      .get_or_try_init(|| async { self.source.fetch_board().await.map(Arc::new) })
      .await;

    match res {
      Ok(board) => Some(Arc::clone(board)),
      Err(e) => {
        warn!(error = %e, "failed to fetch board data");
        None
      }
    }
  }

  /// Stats of `layer` from the current progress.
  pub async fn layer_stats(&self, layer: u32) -> LayerStats {
    let totals = match self.board().await {
      Some(board) => {
        let mut cache = self
          .totals
          .lock()
          .unwrap_or_else(std::sync::PoisonError::into_inner);
        Some(
          cache
            .entry(layer)
            .or_insert_with(|| board.layer_totals(layer))
            .clone()
        )
      }
      None => None
    };

    let progress = self.mirror.board_progress();
    let multipliers = self.settings.layer_multipliers();

    compute_with_totals(layer, progress.as_deref(), &multipliers, totals.as_ref())
  }
}
