use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::{StoreError, StoreResult};

/// Label given to watchlist items added without one.
pub const DEFAULT_LABEL: &str = "All";

/// Current time truncated to microseconds, the precision every backend can store.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Trim and upper-case a ticker. Returns `None` for a blank symbol.
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_uppercase())
    }
}

/// One scanned stock as produced by the upstream scan service.
///
/// Only the four fields every consumer relies on are typed; the remaining
/// indicator columns are kept verbatim so the record passes through intact.
/// Price and RSI stay as JSON numbers so `10` is not re-emitted as `10.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockData {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Current Price")]
    pub current_price: Number,
    #[serde(rename = "RSI (14)")]
    pub rsi_14: Number,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StockData {
    fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn momentum_score(&self) -> Option<f64> {
        self.number("Momentum Score")
    }

    pub fn drawdown_pct(&self) -> Option<f64> {
        self.number("Drawdown %")
    }

    pub fn current_volume(&self) -> Option<f64> {
        self.number("Current Volume")
    }

    pub fn sector(&self) -> Option<&str> {
        self.fields.get("Sector").and_then(Value::as_str)
    }

    /// The full record as a JSON object, upstream keys included.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = self.fields.clone();
        record.insert("Symbol".into(), Value::from(self.symbol.clone()));
        record.insert("Name".into(), Value::from(self.name.clone()));
        record.insert("Current Price".into(), Value::Number(self.current_price.clone()));
        record.insert("RSI (14)".into(), Value::Number(self.rsi_14.clone()));
        record
    }
}

/// A symbol saved to a user's watchlist along with the metrics it had when added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub label: String,
    pub metrics: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchlistItem {
    /// Materialize a validated insert with a freshly generated id.
    pub fn from_new(id: String, new: NewWatchlistItem, now: DateTime<Utc>) -> StoreResult<Self> {
        let symbol = normalize_symbol(&new.symbol)
            .ok_or_else(|| StoreError::InvalidInput("symbol must not be empty".into()))?;
        if new.user_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("user id must not be empty".into()));
        }

        Ok(Self {
            id,
            user_id: new.user_id,
            symbol,
            label: new.label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            metrics: new.metrics,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Insert request for [`crate::WatchlistRepository::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewWatchlistItem {
    pub user_id: String,
    pub symbol: String,
    pub label: Option<String>,
    pub metrics: Map<String, Value>,
}

/// Mutable subset of a watchlist item. Only the label can change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WatchlistPatch {
    pub label: Option<String>,
}

impl WatchlistPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self { label: Some(label.into()) }
    }

    pub fn apply(&self, item: &mut WatchlistItem, now: DateTime<Utc>) {
        if let Some(label) = &self.label {
            item.label = label.clone();
        }
        item.updated_at = now;
    }
}

/// Metrics supplied when adding a symbol to the watchlist.
///
/// Snapshotted into the item's `metrics` object together with an `addedAt`
/// stamp; entries in `metrics` win over the named fields on key collision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsInput {
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub rsi: Option<f64>,
    pub drawdown: Option<f64>,
    pub volume: Option<f64>,
    pub momentum_score: Option<f64>,
    #[serde(default)]
    pub metrics: Option<Map<String, Value>>,
}

impl MetricsInput {
    /// Fill unset fields from a scanned record and keep the whole record as extra metrics.
    pub fn fill_from_stock(&mut self, stock: &StockData) {
        self.name.get_or_insert_with(|| stock.name.clone());
        if self.current_price.is_none() {
            self.current_price = stock.current_price.as_f64();
        }
        if self.rsi.is_none() {
            self.rsi = stock.rsi_14.as_f64();
        }
        if self.drawdown.is_none() {
            self.drawdown = stock.drawdown_pct();
        }
        if self.volume.is_none() {
            self.volume = stock.current_volume();
        }
        if self.momentum_score.is_none() {
            self.momentum_score = stock.momentum_score();
        }

        let mut extra = stock.to_record();
        if let Some(explicit) = self.metrics.take() {
            extra.extend(explicit);
        }
        self.metrics = Some(extra);
    }

    pub fn snapshot(self, added_at: DateTime<Utc>) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("name".into(), self.name.map(Value::from).unwrap_or(Value::Null));
        out.insert("currentPrice".into(), number_or_null(self.current_price));
        out.insert("rsi".into(), number_or_null(self.rsi));
        out.insert("drawdown".into(), number_or_null(self.drawdown));
        out.insert("volume".into(), number_or_null(self.volume));
        out.insert("momentumScore".into(), number_or_null(self.momentum_score));
        out.insert("addedAt".into(), Value::from(added_at.to_rfc3339()));
        if let Some(extra) = self.metrics {
            out.extend(extra);
        }
        out
    }
}

fn number_or_null(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}
