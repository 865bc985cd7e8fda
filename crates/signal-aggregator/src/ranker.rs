//! Opportunity Ranking Module
//!
//! Ranks symbols by confluence score scaled with a capped momentum factor.
//! Volume is formatted for display only and does not enter the ranking.

use breakdown_core::{round1, Direction, Opportunity, Sentiment, Signal};

/// Symbols upstream sources emit when they have nothing real
const PLACEHOLDER_SYMBOLS: &[&str] = &["N/A", "NA", "NONE", "NULL", "UNKNOWN", "-", "--"];

/// Tunable ranking constants. Defaults are the empirically chosen values
/// the dashboard has always used.
#[derive(Debug, Clone)]
pub struct RankingParams {
    /// Minimum confluence score to be considered at all
    pub min_score: f64,
    /// Each this-many percent of 24h move adds 1.0 to the momentum factor
    pub momentum_divisor: f64,
    /// Ceiling on the momentum factor
    pub max_momentum_factor: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            momentum_divisor: 10.0,
            max_momentum_factor: 2.0,
        }
    }
}

/// Derives ranked opportunities from raw signals
pub struct OpportunityRanker {
    params: RankingParams,
}

impl Default for OpportunityRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl OpportunityRanker {
    pub fn new() -> Self {
        Self {
            params: RankingParams::default(),
        }
    }

    pub fn with_params(params: RankingParams) -> Self {
        Self { params }
    }

    /// Filter, score, sort descending and truncate to `limit`.
    pub fn derive(&self, signals: &[Signal], limit: usize) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = signals
            .iter()
            .filter(|s| is_rankable_symbol(&s.symbol))
            .filter(|s| s.score.is_finite() && s.score >= self.params.min_score)
            .map(|s| self.to_opportunity(s))
            .collect();

        opportunities.sort_by(|a, b| b.opportunity_score.total_cmp(&a.opportunity_score));
        opportunities.truncate(limit);
        opportunities
    }

    /// `min(max_factor, 1 + |change| / divisor)`
    pub fn momentum_factor(&self, change_24h: f64) -> f64 {
        let strength = if change_24h.is_finite() {
            change_24h.abs()
        } else {
            0.0
        };
        (1.0 + strength / self.params.momentum_divisor).min(self.params.max_momentum_factor)
    }

    fn to_opportunity(&self, signal: &Signal) -> Opportunity {
        let change = signal.change_24h.unwrap_or(0.0);
        let momentum_factor = self.momentum_factor(change);

        Opportunity {
            symbol: signal.symbol.clone(),
            score: round1(signal.score),
            momentum_label: format_momentum(signal.change_24h),
            volume_label: format_volume(signal.volume_24h),
            direction: direction_for(signal, change),
            opportunity_score: signal.score * momentum_factor,
        }
    }
}

/// Rank with the default parameters
pub fn derive_opportunities(signals: &[Signal], limit: usize) -> Vec<Opportunity> {
    OpportunityRanker::new().derive(signals, limit)
}

fn is_rankable_symbol(symbol: &str) -> bool {
    let symbol = symbol.trim();
    !symbol.is_empty() && !PLACEHOLDER_SYMBOLS.contains(&symbol.to_ascii_uppercase().as_str())
}

/// Price move decides direction; a flat or missing move defers to the
/// signal's own sentiment label, then to its score.
fn direction_for(signal: &Signal, change: f64) -> Direction {
    if change > 0.0 {
        Direction::Bullish
    } else if change < 0.0 {
        Direction::Bearish
    } else {
        signal
            .sentiment
            .as_deref()
            .and_then(Sentiment::from_label)
            .unwrap_or_else(|| Sentiment::from_score(signal.score))
            .into()
    }
}

pub fn format_momentum(change_24h: Option<f64>) -> String {
    match change_24h {
        Some(change) if change.is_finite() => format!("{:+.2}%", change),
        _ => "N/A".to_string(),
    }
}

pub fn format_volume(volume_24h: Option<f64>) -> String {
    match volume_24h {
        Some(v) if v.is_finite() && v >= 1_000_000.0 => format!("${:.1}M", v / 1_000_000.0),
        Some(v) if v.is_finite() && v > 0.0 => format!("${:.1}K", v / 1_000.0),
        _ => "N/A".to_string(),
    }
}
