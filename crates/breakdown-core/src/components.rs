//! Component score normalization
//!
//! Upstream engines emit component maps with drifting key names
//! (`order_flow`, `orderbook_depth`, `technical_indicators`, ...) and values
//! that are sometimes plain numbers and sometimes nested objects with a
//! `score` field. Everything is folded onto the six canonical components.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Score used for any component the upstream did not provide
pub const DEFAULT_COMPONENT_SCORE: f64 = 50.0;

pub const CANONICAL_COMPONENTS: [&str; 6] = [
    "technical",
    "volume",
    "orderflow",
    "sentiment",
    "orderbook",
    "price_structure",
];

/// The six canonical component scores. Serializes as a map with exactly
/// these keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub technical: f64,
    pub volume: f64,
    pub orderflow: f64,
    pub sentiment: f64,
    pub orderbook: f64,
    pub price_structure: f64,
}

impl Default for ComponentScores {
    fn default() -> Self {
        Self {
            technical: DEFAULT_COMPONENT_SCORE,
            volume: DEFAULT_COMPONENT_SCORE,
            orderflow: DEFAULT_COMPONENT_SCORE,
            sentiment: DEFAULT_COMPONENT_SCORE,
            orderbook: DEFAULT_COMPONENT_SCORE,
            price_structure: DEFAULT_COMPONENT_SCORE,
        }
    }
}

impl ComponentScores {
    pub fn get(&self, component: &str) -> Option<f64> {
        match component {
            "technical" => Some(self.technical),
            "volume" => Some(self.volume),
            "orderflow" => Some(self.orderflow),
            "sentiment" => Some(self.sentiment),
            "orderbook" => Some(self.orderbook),
            "price_structure" => Some(self.price_structure),
            _ => None,
        }
    }

    fn slot_mut(&mut self, component: &str) -> Option<&mut f64> {
        match component {
            "technical" => Some(&mut self.technical),
            "volume" => Some(&mut self.volume),
            "orderflow" => Some(&mut self.orderflow),
            "sentiment" => Some(&mut self.sentiment),
            "orderbook" => Some(&mut self.orderbook),
            "price_structure" => Some(&mut self.price_structure),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        CANONICAL_COMPONENTS
            .iter()
            .filter_map(move |name| self.get(name).map(|score| (*name, score)))
    }
}

/// Map an upstream component key onto a canonical one.
///
/// Checked most-specific first: `orderbook` before `orderflow` since both
/// start with "order", and `price_structure` before anything containing
/// "price".
pub fn canonical_component(key: &str) -> Option<&'static str> {
    let key = key.to_ascii_lowercase().replace(['-', ' '], "_");
    if CANONICAL_COMPONENTS.contains(&key.as_str()) {
        return CANONICAL_COMPONENTS.iter().copied().find(|c| *c == key.as_str());
    }
    if key.contains("structure") || key.contains("price") || key.contains("support") {
        Some("price_structure")
    } else if key.contains("book") || key.contains("depth") || key.contains("liquidity") {
        Some("orderbook")
    } else if key.contains("flow") || key.contains("cvd") || key.contains("delta") {
        Some("orderflow")
    } else if key.contains("volume") {
        Some("volume")
    } else if key.contains("sentiment") || key.contains("funding") || key.contains("social") {
        Some("sentiment")
    } else if key.contains("tech") || key.contains("indicator") || key.contains("momentum") {
        Some("technical")
    } else {
        None
    }
}

/// Coerce an upstream component value to a score.
///
/// Numbers and numeric strings are taken as-is, objects contribute their
/// `score` field. Anything else falls back to the default with a warning.
pub fn component_value(component: &str, value: &Value) -> f64 {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(obj) => obj.get("score").and_then(|s| match s {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }),
        _ => None,
    };

    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 100.0),
        _ => {
            tracing::warn!(
                "Unusable value for component '{}' ({}), defaulting to {}",
                component,
                value,
                DEFAULT_COMPONENT_SCORE
            );
            DEFAULT_COMPONENT_SCORE
        }
    }
}

/// Fold an upstream component map onto the canonical six.
///
/// Exact canonical keys win over heuristic matches; among heuristic matches
/// the first key seen wins. Unmappable keys are dropped.
pub fn normalize_components(raw: &Map<String, Value>) -> ComponentScores {
    let mut scores = ComponentScores::default();
    let mut filled: Vec<&'static str> = Vec::with_capacity(CANONICAL_COMPONENTS.len());

    for (key, value) in raw {
        if let Some(component) = CANONICAL_COMPONENTS.iter().copied().find(|c| *c == key.as_str()) {
            if let Some(slot) = scores.slot_mut(component) {
                *slot = component_value(component, value);
                filled.push(component);
            }
        }
    }

    for (key, value) in raw {
        if CANONICAL_COMPONENTS.contains(&key.as_str()) {
            continue;
        }
        match canonical_component(key) {
            Some(component) if !filled.contains(&component) => {
                tracing::debug!("Mapped upstream component '{}' onto '{}'", key, component);
                if let Some(slot) = scores.slot_mut(component) {
                    *slot = component_value(component, value);
                    filled.push(component);
                }
            }
            Some(_) => {}
            None => tracing::debug!("Dropping unrecognized component '{}'", key),
        }
    }

    scores
}
