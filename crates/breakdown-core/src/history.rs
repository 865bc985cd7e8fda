//! Score History Tracker
//!
//! Bounded per-symbol history of recent overall scores for trend sparklines.
//! Lives in process memory only; a restart starts every buffer empty.

use dashmap::DashMap;
use std::collections::VecDeque;

use crate::types::round1;

pub const DEFAULT_HISTORY_CAPACITY: usize = 24;

/// Per-symbol ring buffers. Each symbol's buffer is mutated under its
/// dashmap shard lock, so concurrent writers for one symbol serialize.
pub struct ScoreHistoryTracker {
    buffers: DashMap<String, VecDeque<f64>>,
    capacity: usize,
}

impl Default for ScoreHistoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ScoreHistoryTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a score and return the resulting history, oldest first.
    ///
    /// The score is rounded to one decimal and only appended when it differs
    /// from the last stored value, so repeated polling of an unchanged score
    /// leaves the history alone.
    pub fn append(&self, symbol: &str, score: f64) -> Vec<f64> {
        if !score.is_finite() {
            tracing::warn!("Ignoring non-finite score for {} history", symbol);
            return self.snapshot(symbol);
        }
        let rounded = round1(score);
        let mut buffer = self
            .buffers
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        let is_repeat = buffer
            .back()
            .is_some_and(|last| (last - rounded).abs() < 1e-9);
        if !is_repeat {
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(rounded);
        }

        buffer.iter().copied().collect()
    }

    /// Copy of the current history; empty for unknown symbols.
    pub fn snapshot(&self, symbol: &str) -> Vec<f64> {
        self.buffers
            .get(symbol)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, symbol: &str) -> bool {
        self.buffers.remove(symbol).is_some()
    }

    /// Number of symbols with a history buffer
    pub fn tracked_symbols(&self) -> usize {
        self.buffers.len()
    }
}
