//! Interpretation Standardizer
//!
//! Interpretations arrive as plain prose, as structured objects (the sentiment
//! engine emits its sub-signals as a map), or as a list of
//! `{component, interpretation}` entries. At rest they are always
//! `component -> prose`. Standardization is re-appliable: prose that was
//! already elaborated is past the length thresholds and passes through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::components::{
    canonical_component, ComponentScores, CANONICAL_COMPONENTS, DEFAULT_COMPONENT_SCORE,
};

/// Orderflow prose shorter than this gets an elaboration paragraph
pub const ORDERFLOW_MIN_CHARS: usize = 250;
/// Price-structure prose shorter than this gets an elaboration paragraph
pub const PRICE_STRUCTURE_MIN_CHARS: usize = 150;

const SENTIMENT_STRONG_BULLISH: f64 = 65.0;
const SENTIMENT_MILD_BULLISH: f64 = 55.0;
const SENTIMENT_STRONG_BEARISH: f64 = 35.0;
const SENTIMENT_MILD_BEARISH: f64 = 45.0;

const ELABORATION_BULLISH_BAND: f64 = 60.0;
const ELABORATION_BEARISH_BAND: f64 = 40.0;

const SENTIMENT_ELABORATIONS: [&str; 5] = [
    "Crowd positioning leans decisively bullish, a backdrop that tends to support continuation for as long as it persists.",
    "Sentiment tilts mildly bullish; it is supportive but not strong enough on its own to drive price.",
    "Crowd positioning leans decisively bearish, which tends to add selling pressure into any rally.",
    "Sentiment tilts mildly bearish and acts as a headwind rather than a driver.",
    "Sentiment is balanced and offers no directional edge at the moment.",
];

const ORDERFLOW_BULLISH: &str = "Aggressive buyers are consistently lifting offers and cumulative volume delta is trending higher, \
which shows real demand absorbing supply rather than passive accumulation. As long as buy-side aggression holds, \
pullbacks are likely to be bought and short-term continuation to the upside is favoured.";
const ORDERFLOW_BEARISH: &str = "Aggressive sellers are consistently hitting bids and cumulative volume delta is trending lower, \
which shows supply overwhelming demand rather than simple profit taking. While sell-side aggression persists, \
bounces are likely to be sold and short-term continuation to the downside is favoured.";
const ORDERFLOW_NEUTRAL: &str = "Buy and sell aggression are roughly matched and cumulative volume delta is moving sideways, \
so neither side is in control of the tape. Expect rotation inside the current range until one side commits with size, \
and treat breakouts without a matching shift in delta with suspicion.";

const PRICE_STRUCTURE_BULLISH: &str = "Price is printing higher highs and higher lows above reclaimed support, \
so the structure favours buying dips into that support while the sequence holds.";
const PRICE_STRUCTURE_BEARISH: &str = "Price is printing lower highs and lower lows beneath lost support, \
so the structure favours selling rallies into that resistance while the sequence holds.";
const PRICE_STRUCTURE_NEUTRAL: &str = "Price is rotating between established support and resistance without a clear \
sequence of swings, so the structure favours range tactics until a level breaks.";

/// One interpretation value as received from upstream or read back from a
/// legacy cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Interpretation {
    Text(String),
    Structured(Map<String, Value>),
    Other(Value),
}

/// List-form entry: `{"component": "...", "interpretation": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationEntry {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub interpretation: Option<Interpretation>,
}

/// Every shape the interpretations field has been seen in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInterpretations {
    Map(BTreeMap<String, Interpretation>),
    List(Vec<InterpretationEntry>),
    Other(Value),
}

impl Default for RawInterpretations {
    fn default() -> Self {
        RawInterpretations::Map(BTreeMap::new())
    }
}

impl From<BTreeMap<String, String>> for RawInterpretations {
    fn from(map: BTreeMap<String, String>) -> Self {
        RawInterpretations::Map(
            map.into_iter()
                .map(|(k, v)| (k, Interpretation::Text(v)))
                .collect(),
        )
    }
}

impl RawInterpretations {
    /// Flatten to `(component, value)` pairs: key order for maps, list order
    /// for lists.
    fn entries(&self) -> Vec<(String, Interpretation)> {
        match self {
            RawInterpretations::Map(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            RawInterpretations::List(list) => list
                .iter()
                .filter_map(|entry| match (&entry.component, &entry.interpretation) {
                    (Some(component), Some(value)) => Some((component.clone(), value.clone())),
                    _ => {
                        tracing::warn!("Skipping interpretation entry without component/text");
                        None
                    }
                })
                .collect(),
            RawInterpretations::Other(Value::Null) => Vec::new(),
            RawInterpretations::Other(other) => {
                tracing::warn!("Ignoring interpretations of unexpected shape: {}", other);
                Vec::new()
            }
        }
    }
}

/// Produce the canonical `component -> prose` map.
///
/// Keys that map onto a canonical component are renamed to it; others are
/// kept verbatim. An exact canonical key always beats a heuristic match for
/// the same component; otherwise the first entry wins.
pub fn standardize_interpretations(
    raw: &RawInterpretations,
    scores: &ComponentScores,
) -> BTreeMap<String, String> {
    let entries = raw.entries();
    let (exact, rest): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|(key, _)| CANONICAL_COMPONENTS.contains(&key.as_str()));

    let mut out = BTreeMap::new();
    for (key, value) in exact.into_iter().chain(rest) {
        let component = canonical_component(&key)
            .map(str::to_string)
            .unwrap_or(key);
        if out.contains_key(&component) {
            continue;
        }
        let score = scores.get(&component).unwrap_or(DEFAULT_COMPONENT_SCORE);
        let text = standardize_one(&component, &value, score);
        out.insert(component, text);
    }

    out
}

fn standardize_one(component: &str, value: &Interpretation, score: f64) -> String {
    let text = match value {
        Interpretation::Text(text) => text.clone(),
        Interpretation::Structured(obj) if component == "sentiment" => {
            render_sentiment(obj, score)
        }
        Interpretation::Structured(obj) => render_object(obj),
        Interpretation::Other(Value::Null) => {
            tracing::warn!("Null interpretation for '{}', using empty text", component);
            String::new()
        }
        Interpretation::Other(other) => other.to_string(),
    };

    match component {
        "orderflow" if text.chars().count() < ORDERFLOW_MIN_CHARS => {
            elaborate(&text, banded(score, ORDERFLOW_BULLISH, ORDERFLOW_BEARISH, ORDERFLOW_NEUTRAL))
        }
        "price_structure" if text.chars().count() < PRICE_STRUCTURE_MIN_CHARS => elaborate(
            &text,
            banded(
                score,
                PRICE_STRUCTURE_BULLISH,
                PRICE_STRUCTURE_BEARISH,
                PRICE_STRUCTURE_NEUTRAL,
            ),
        ),
        _ => text,
    }
}

fn banded(score: f64, bullish: &'static str, bearish: &'static str, neutral: &'static str) -> &'static str {
    if score >= ELABORATION_BULLISH_BAND {
        bullish
    } else if score <= ELABORATION_BEARISH_BAND {
        bearish
    } else {
        neutral
    }
}

fn elaborate(text: &str, paragraph: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() {
        paragraph.to_string()
    } else {
        format!("{} {}", text, paragraph)
    }
}

fn sentiment_elaboration(score: f64) -> &'static str {
    if score >= SENTIMENT_STRONG_BULLISH {
        SENTIMENT_ELABORATIONS[0]
    } else if score >= SENTIMENT_MILD_BULLISH {
        SENTIMENT_ELABORATIONS[1]
    } else if score <= SENTIMENT_STRONG_BEARISH {
        SENTIMENT_ELABORATIONS[2]
    } else if score <= SENTIMENT_MILD_BEARISH {
        SENTIMENT_ELABORATIONS[3]
    } else {
        SENTIMENT_ELABORATIONS[4]
    }
}

/// Render the sentiment engine's structured output as prose.
fn render_sentiment(obj: &Map<String, Value>, score: f64) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(label) = first_str(obj, &["sentiment", "label", "signal"]) {
        parts.push(format!("Overall sentiment is {}", label.to_lowercase()));
    }
    if let Some(funding) = first_value(obj, &["funding_rate", "funding"]) {
        parts.push(match funding {
            Value::Number(n) => format!("Funding rate at {:.4}%", n.as_f64().unwrap_or(0.0)),
            other => note(other),
        });
    }
    if let Some(ratio) = first_value(obj, &["long_short_ratio", "long_short"]) {
        parts.push(match ratio {
            Value::Number(n) => format!("Long/short ratio at {:.2}", n.as_f64().unwrap_or(0.0)),
            other => note(other),
        });
    }
    if let Some(activity) = first_value(obj, &["market_activity", "activity"]) {
        parts.push(match activity {
            Value::Number(n) => format!("Market activity score {:.1}", n.as_f64().unwrap_or(0.0)),
            other => note(other),
        });
    }

    let parts: Vec<String> = parts
        .into_iter()
        .map(|p| p.trim().trim_end_matches('.').to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let elaboration = sentiment_elaboration(score);
    if parts.is_empty() {
        elaboration.to_string()
    } else {
        format!("{}. {}", parts.join(". "), elaboration)
    }
}

/// Generic object coercion for components without a dedicated renderer
fn render_object(obj: &Map<String, Value>) -> String {
    obj.iter()
        .map(|(k, v)| format!("{}: {}", k, note(v)))
        .collect::<Vec<_>>()
        .join("; ")
}

fn note(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}
