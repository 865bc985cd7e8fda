//! Breakdown Record Builder
//!
//! Turns a scoring-engine result into a complete [`BreakdownRecord`], and
//! turns whatever is found in the cache back into one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::{normalize_components, ComponentScores};
use crate::interpretation::{standardize_interpretations, RawInterpretations};
use crate::types::{BreakdownRecord, Sentiment};

/// Scoring-engine output. Only `confluence_score` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(alias = "score", alias = "overall_score")]
    pub confluence_score: f64,
    #[serde(default)]
    pub reliability: Option<f64>,
    /// Flat `name -> score` map or `name -> {score, ...}` objects
    #[serde(default)]
    pub components: Option<Value>,
    #[serde(default)]
    pub interpretations: Option<RawInterpretations>,
}

impl AnalysisResult {
    pub fn new(confluence_score: f64) -> Self {
        Self {
            confluence_score,
            ..Default::default()
        }
    }
}

/// Build the record written to the cache.
pub fn build_record(result: &AnalysisResult, score_history: Vec<f64>) -> BreakdownRecord {
    let overall_score = clamp_score(result.confluence_score);
    let components = components_from_value(result.components.as_ref());
    let interpretations = standardize_interpretations(
        &result.interpretations.clone().unwrap_or_default(),
        &components,
    );

    BreakdownRecord {
        overall_score,
        sentiment: Sentiment::from_score(overall_score),
        reliability: normalize_reliability(result.reliability.unwrap_or(0.0)),
        components,
        interpretations,
        timestamp: Utc::now().timestamp(),
        score_history,
    }
}

/// Shape of a `confluence:breakdown:*` entry as read back. Lenient about
/// everything except the overall score, since older writers and the external
/// scoring engine do not agree on the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredBreakdown {
    #[serde(alias = "score")]
    pub overall_score: f64,
    #[serde(default)]
    pub sentiment: Option<Value>,
    #[serde(default)]
    pub reliability: Option<f64>,
    #[serde(default)]
    pub components: Option<Value>,
    #[serde(default)]
    pub interpretations: Option<RawInterpretations>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default, deserialize_with = "finite_scores")]
    pub score_history: Vec<f64>,
}

/// Stored histories may hold `null` where an older writer serialized NaN.
fn finite_scores<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .iter()
        .filter_map(Value::as_f64)
        .filter(|v| v.is_finite())
        .collect())
}

impl StoredBreakdown {
    /// Re-normalize a stored entry. Interpretations are standardized again so
    /// entries written before the prose format existed read back as prose.
    pub fn into_record(self) -> BreakdownRecord {
        let overall_score = clamp_score(self.overall_score);
        let components = components_from_value(self.components.as_ref());
        let interpretations = standardize_interpretations(
            &self.interpretations.unwrap_or_default(),
            &components,
        );
        let sentiment = self
            .sentiment
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Sentiment::from_label)
            .unwrap_or_else(|| Sentiment::from_score(overall_score));

        BreakdownRecord {
            overall_score,
            sentiment,
            reliability: normalize_reliability(self.reliability.unwrap_or(0.0)),
            components,
            interpretations,
            timestamp: self
                .timestamp
                .filter(|t| t.is_finite())
                .map(|t| t as i64)
                .unwrap_or(0),
            score_history: self.score_history,
        }
    }
}

fn components_from_value(value: Option<&Value>) -> ComponentScores {
    match value {
        Some(Value::Object(map)) => normalize_components(map),
        None | Some(Value::Null) => ComponentScores::default(),
        Some(other) => {
            tracing::warn!("Components of unexpected shape ({}), using defaults", other);
            ComponentScores::default()
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        tracing::warn!("Non-finite confluence score, storing 50.0");
        50.0
    }
}

/// Reliability is shown as 0-100; engines reporting a 0-1 fraction are scaled.
fn normalize_reliability(reliability: f64) -> f64 {
    if !reliability.is_finite() {
        return 0.0;
    }
    let scaled = if reliability <= 1.0 {
        reliability * 100.0
    } else {
        reliability
    };
    scaled.clamp(0.0, 100.0)
}
