use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::components::ComponentScores;

/// Score at or above which a breakdown reads as bullish
pub const BULLISH_THRESHOLD: f64 = 70.0;
/// Score at or below which a breakdown reads as bearish
pub const BEARISH_THRESHOLD: f64 = 30.0;

/// Sentiment label derived from the overall confluence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn from_score(score: f64) -> Self {
        if score >= BULLISH_THRESHOLD {
            Sentiment::Bullish
        } else if score <= BEARISH_THRESHOLD {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }

    /// Lenient label parsing for upstream strings ("bullish", "BEARISH", ...)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "bullish" => Some(Sentiment::Bullish),
            "bearish" => Some(Sentiment::Bearish),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "BULLISH",
            Sentiment::Bearish => "BEARISH",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

/// Trade direction of a ranked opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl From<Sentiment> for Direction {
    fn from(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Bullish => Direction::Bullish,
            Sentiment::Bearish => Direction::Bearish,
            Sentiment::Neutral => Direction::Neutral,
        }
    }
}

/// Latest known analysis for one symbol, as stored under
/// `confluence:breakdown:{SYMBOL}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRecord {
    pub overall_score: f64,
    pub sentiment: Sentiment,
    /// Confidence, 0-100
    pub reliability: f64,
    pub components: ComponentScores,
    pub interpretations: BTreeMap<String, String>,
    /// Unix seconds
    pub timestamp: i64,
    pub score_history: Vec<f64>,
}

/// Score-only probe stored under `confluence:score:{SYMBOL}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub score: f64,
    pub sentiment: Sentiment,
    #[serde(deserialize_with = "unix_seconds")]
    pub timestamp: i64,
}

/// Accept integer or fractional unix seconds; other writers of the score
/// keys store floats.
pub fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value as i64)
    } else {
        Err(serde::de::Error::custom("timestamp is not a finite number"))
    }
}

const SCORE_KEYS: &[&str] = &["score", "confluence_score"];
const CHANGE_KEYS: &[&str] = &["change_24h", "change24h", "price_change_24h", "priceChange24h"];
const VOLUME_KEYS: &[&str] = &["volume_24h", "volume24h", "volume"];

/// Key a numeric signal field was read from, with the value as sent.
#[derive(Debug, Clone, PartialEq)]
struct WireField {
    key: &'static str,
    raw: Option<Value>,
}

impl WireField {
    fn canonical(keys: &'static [&'static str]) -> Self {
        Self { key: keys[0], raw: None }
    }

    /// Take the first of `keys` present in `map`. Other spellings stay in the map.
    fn take(
        map: &mut Map<String, Value>,
        keys: &'static [&'static str],
    ) -> Result<(Option<f64>, Self), String> {
        let Some(key) = keys.iter().copied().find(|k| map.contains_key(*k)) else {
            return Ok((None, Self::canonical(keys)));
        };
        let raw = map.remove(key).unwrap_or(Value::Null);
        let number = match &raw {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            other => return Err(format!("`{}` must be a number, got {}", key, other)),
        };
        Ok((number, Self { key, raw: Some(raw) }))
    }

    /// Write `value` back under the key it came from, reusing the original
    /// JSON when the value is unchanged.
    fn put(&self, map: &mut Map<String, Value>, value: Option<f64>) {
        let out = match (value, &self.raw) {
            (Some(v), Some(raw)) if raw.as_f64() == Some(v) => raw.clone(),
            (Some(v), _) => Value::from(v),
            (None, Some(Value::Null)) => Value::Null,
            (None, _) => return,
        };
        map.insert(self.key.to_string(), out);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WireKeys {
    score: WireField,
    change_24h: WireField,
    volume_24h: WireField,
}

impl Default for WireKeys {
    fn default() -> Self {
        Self {
            score: WireField::canonical(SCORE_KEYS),
            change_24h: WireField::canonical(CHANGE_KEYS),
            volume_24h: WireField::canonical(VOLUME_KEYS),
        }
    }
}

/// Raw per-symbol signal from an external source, pre-enrichment.
///
/// Score, change and volume are read from any of their common spellings and
/// written back under the spelling the source used. Everything else the
/// source sends is kept in `extra`, so enrichment never renames or drops a
/// field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Signal {
    pub symbol: String,
    pub score: f64,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub sentiment: Option<String>,
    pub extra: Map<String, Value>,
    wire: WireKeys,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, score: f64) -> Self {
        Self {
            symbol: symbol.into(),
            score,
            ..Default::default()
        }
    }

    pub fn with_change(mut self, change_24h: f64) -> Self {
        self.change_24h = Some(change_24h);
        self
    }

    pub fn with_volume(mut self, volume_24h: f64) -> Self {
        self.volume_24h = Some(volume_24h);
        self
    }

    pub fn has_symbol(&self) -> bool {
        !self.symbol.trim().is_empty()
    }
}

impl TryFrom<Map<String, Value>> for Signal {
    type Error = String;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let symbol = match map.remove("symbol") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(other) => return Err(format!("`symbol` must be a string, got {}", other)),
        };
        let sentiment = match map.remove("sentiment") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => return Err(format!("`sentiment` must be a string, got {}", other)),
        };
        let price = match map.remove("price") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => return Err(format!("`price` must be a number, got {}", other)),
        };
        let (score, score_key) = WireField::take(&mut map, SCORE_KEYS)?;
        let (change_24h, change_key) = WireField::take(&mut map, CHANGE_KEYS)?;
        let (volume_24h, volume_key) = WireField::take(&mut map, VOLUME_KEYS)?;

        Ok(Self {
            symbol,
            score: score.unwrap_or(0.0),
            price,
            change_24h,
            volume_24h,
            sentiment,
            extra: map,
            wire: WireKeys {
                score: score_key,
                change_24h: change_key,
                volume_24h: volume_key,
            },
        })
    }
}

impl From<Signal> for Map<String, Value> {
    fn from(signal: Signal) -> Self {
        let mut map = signal.extra;
        map.insert("symbol".to_string(), Value::String(signal.symbol));
        signal.wire.score.put(&mut map, Some(signal.score));
        if let Some(price) = signal.price {
            map.insert("price".to_string(), Value::from(price));
        }
        signal.wire.change_24h.put(&mut map, signal.change_24h);
        signal.wire.volume_24h.put(&mut map, signal.volume_24h);
        if let Some(sentiment) = signal.sentiment {
            map.insert("sentiment".to_string(), Value::String(sentiment));
        }
        map
    }
}

/// A signal plus whatever the breakdown cache knew about its symbol.
/// The wrapped signal is never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSignal {
    #[serde(flatten)]
    pub signal: Signal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretations: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
    pub has_breakdown: bool,
}

impl EnrichedSignal {
    pub fn unenriched(signal: Signal) -> Self {
        Self {
            signal,
            components: None,
            interpretations: None,
            reliability: None,
            has_breakdown: false,
        }
    }

    pub fn with_breakdown(signal: Signal, record: BreakdownRecord) -> Self {
        Self {
            signal,
            components: Some(record.components),
            interpretations: Some(record.interpretations),
            reliability: Some(record.reliability),
            has_breakdown: true,
        }
    }
}

/// Ranked trade opportunity. Computed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub symbol: String,
    pub score: f64,
    pub momentum_label: String,
    pub volume_label: String,
    pub direction: Direction,
    /// Sort key only
    #[serde(skip)]
    pub opportunity_score: f64,
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
