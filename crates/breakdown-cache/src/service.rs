//! Breakdown Cache Store
//!
//! Write path: build record, merge score into history, write breakdown and
//! score probe. Read path: decode and re-normalize. Failures of any kind are
//! logged and reported as `false` / `None`.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use breakdown_core::{
    build_record, AnalysisResult, BreakdownRecord, ScoreHistoryTracker, ScoreSnapshot,
    StoredBreakdown, Symbol,
};

use crate::config::CacheConfig;
use crate::store::KeyValueStore;

pub fn breakdown_key(symbol: &Symbol) -> String {
    format!("confluence:breakdown:{}", symbol)
}

pub fn score_key(symbol: &Symbol) -> String {
    format!("confluence:score:{}", symbol)
}

/// Read-side seam used by enrichment, so it can run against fakes.
#[async_trait]
pub trait BreakdownLookup: Send + Sync {
    async fn breakdown(&self, symbol: &str) -> Option<BreakdownRecord>;
}

#[derive(Debug, Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    writes: AtomicU64,
    failed_writes: AtomicU64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub writes: u64,
    pub failed_writes: u64,
    pub hit_rate: f64,
    pub tracked_symbols: usize,
}

/// Breakdown cache. Constructed once at startup and shared by reference.
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    history: ScoreHistoryTracker,
    config: CacheConfig,
    stats: StatsCounters,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self {
            store,
            history: ScoreHistoryTracker::new(config.history_capacity),
            config,
            stats: StatsCounters::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Cache a fresh analysis for `symbol`.
    ///
    /// Returns false when either key could not be written; the caller should
    /// treat that as "not cached this cycle". The history buffer keeps the
    /// score either way.
    pub async fn put(&self, symbol: &str, result: &AnalysisResult) -> bool {
        let symbol = Symbol::new(symbol);
        if symbol.is_empty() {
            tracing::warn!("Refusing to cache breakdown for empty symbol");
            return false;
        }

        let mut record = build_record(result, Vec::new());
        record.score_history = self.history.append(symbol.as_str(), record.overall_score);
        let probe = ScoreSnapshot {
            score: record.overall_score,
            sentiment: record.sentiment,
            timestamp: record.timestamp,
        };

        let (record_json, probe_json) =
            match (serde_json::to_string(&record), serde_json::to_string(&probe)) {
                (Ok(r), Ok(p)) => (r, p),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("Failed to serialize breakdown for {}: {}", symbol, e);
                    self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            };

        if let Err(e) = self
            .store
            .set_ex(&breakdown_key(&symbol), &record_json, self.config.breakdown_ttl)
            .await
        {
            tracing::warn!("Failed to cache breakdown for {}: {}", symbol, e);
            self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if let Err(e) = self
            .store
            .set_ex(&score_key(&symbol), &probe_json, self.config.score_ttl)
            .await
        {
            tracing::warn!("Failed to cache score probe for {}: {}", symbol, e);
            self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Cached breakdown for {} (score {:.1}, {} history points)",
            symbol,
            record.overall_score,
            record.score_history.len()
        );
        true
    }

    /// Latest breakdown for `symbol`, or `None` on miss, transport failure or
    /// undecodable entry.
    pub async fn get(&self, symbol: &str) -> Option<BreakdownRecord> {
        let symbol = Symbol::new(symbol);
        let raw = self.read(&breakdown_key(&symbol), &symbol).await?;

        match serde_json::from_str::<StoredBreakdown>(&raw) {
            Ok(stored) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(stored.into_record())
            }
            Err(e) => {
                tracing::warn!("Corrupt breakdown entry for {}: {}", symbol, e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Score-only probe, cheaper than a full breakdown and longer-lived.
    pub async fn get_score(&self, symbol: &str) -> Option<ScoreSnapshot> {
        let symbol = Symbol::new(symbol);
        let raw = self.read(&score_key(&symbol), &symbol).await?;

        match serde_json::from_str::<ScoreSnapshot>(&raw) {
            Ok(snapshot) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!("Corrupt score entry for {}: {}", symbol, e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Concurrent lookup of several symbols. Misses are omitted; keys are
    /// normalized symbols.
    pub async fn get_many(&self, symbols: &[String]) -> HashMap<String, BreakdownRecord> {
        let lookups = symbols.iter().map(|raw| async move {
            let symbol = Symbol::new(raw);
            let record = self.get(symbol.as_str()).await;
            (symbol, record)
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(symbol, record)| record.map(|r| (symbol.as_str().to_string(), r)))
            .collect()
    }

    /// Remove both keys and the in-process history for `symbol`.
    pub async fn invalidate(&self, symbol: &str) -> bool {
        let symbol = Symbol::new(symbol);
        self.history.clear(symbol.as_str());

        let mut ok = true;
        for key in [breakdown_key(&symbol), score_key(&symbol)] {
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!("Failed to delete {}: {}", key, e);
                ok = false;
            }
        }
        ok
    }

    /// In-process history for `symbol`, oldest first
    pub fn history(&self, symbol: &str) -> Vec<f64> {
        self.history.snapshot(&Symbol::new(symbol).to_string())
    }

    pub async fn is_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Breakdown store ping failed: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let errors = self.stats.errors.load(Ordering::Relaxed);
        let lookups = hits + misses + errors;

        CacheStats {
            backend: self.store.backend_name().to_string(),
            hits,
            misses,
            errors,
            writes: self.stats.writes.load(Ordering::Relaxed),
            failed_writes: self.stats.failed_writes.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            tracked_symbols: self.history.tracked_symbols(),
        }
    }

    async fn read(&self, key: &str, symbol: &Symbol) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(raw)) => Some(raw),
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", symbol, e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

#[async_trait]
impl BreakdownLookup for CacheService {
    async fn breakdown(&self, symbol: &str) -> Option<BreakdownRecord> {
        self.get(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use breakdown_core::{BreakdownError, BreakdownResult, Sentiment};
    use serde_json::json;
    use std::time::Duration;

    /// Store whose every operation fails, as an unreachable Redis would
    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> BreakdownResult<Option<String>> {
            Err(BreakdownError::Transport("connection refused".into()))
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> BreakdownResult<()> {
            Err(BreakdownError::Transport("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> BreakdownResult<bool> {
            Err(BreakdownError::Transport("connection refused".into()))
        }
        async fn ping(&self) -> BreakdownResult<()> {
            Err(BreakdownError::Transport("connection refused".into()))
        }
        fn backend_name(&self) -> &'static str {
            "down"
        }
    }

    fn memory_service() -> (Arc<MemoryStore>, CacheService) {
        let store = Arc::new(MemoryStore::new());
        let service = CacheService::new(store.clone(), CacheConfig::default());
        (store, service)
    }

    fn analysis(value: serde_json::Value) -> AnalysisResult {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_scenario() {
        let (_, cache) = memory_service();
        let ok = cache
            .put(
                "BTCUSDT",
                &analysis(json!({
                    "confluence_score": 75.5,
                    "reliability": 82,
                    "components": { "technical": 78 }
                })),
            )
            .await;
        assert!(ok);

        let record = cache.get("BTCUSDT").await.expect("cached");
        assert_eq!(record.sentiment, Sentiment::Bullish);
        assert!((record.overall_score - 75.5).abs() < 0.01);
        assert_eq!(record.reliability, 82.0);
        assert_eq!(record.components.technical, 78.0);
        for (name, score) in record.components.iter() {
            if name != "technical" {
                assert_eq!(score, 50.0, "{}", name);
            }
        }
        assert_eq!(record.score_history, vec![75.5]);
    }

    #[tokio::test]
    async fn test_writes_both_keys_in_wire_format() {
        let (store, cache) = memory_service();
        assert!(cache.put("eth/usdt", &AnalysisResult::new(25.0)).await);

        let raw = store.get("confluence:breakdown:ETHUSDT").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in [
            "overall_score",
            "sentiment",
            "reliability",
            "components",
            "interpretations",
            "timestamp",
            "score_history",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["components"].as_object().unwrap().len(), 6);
        assert_eq!(value["sentiment"], "BEARISH");

        let probe = cache.get_score("ETHUSDT").await.unwrap();
        assert_eq!(probe.score, 25.0);
        assert_eq!(probe.sentiment, Sentiment::Bearish);
    }

    #[tokio::test]
    async fn test_repeated_puts_do_not_duplicate_history() {
        let (_, cache) = memory_service();
        for _ in 0..5 {
            cache.put("BTCUSDT", &AnalysisResult::new(61.0)).await;
        }
        cache.put("BTCUSDT", &AnalysisResult::new(64.0)).await;
        let record = cache.get("BTCUSDT").await.unwrap();
        assert_eq!(record.score_history, vec![61.0, 64.0]);
        assert_eq!(cache.history("btc-usdt"), vec![61.0, 64.0]);
    }

    #[tokio::test]
    async fn test_history_tracks_the_stored_score() {
        let (_, cache) = memory_service();
        assert!(cache.put("BTCUSDT", &AnalysisResult::new(140.0)).await);
        let record = cache.get("BTCUSDT").await.unwrap();
        assert_eq!(record.overall_score, 100.0);
        assert_eq!(record.score_history, vec![100.0]);

        assert!(cache.put("SOLUSDT", &AnalysisResult::new(f64::NAN)).await);
        assert!(cache.put("SOLUSDT", &AnalysisResult::new(72.0)).await);
        let record = cache.get("SOLUSDT").await.expect("readable after a NaN score");
        assert_eq!(record.overall_score, 72.0);
        assert_eq!(record.score_history, vec![50.0, 72.0]);
        assert!(cache.history("SOLUSDT").iter().all(|s| s.is_finite()));
    }

    #[tokio::test]
    async fn test_legacy_structured_sentiment_reads_as_text() {
        let (store, cache) = memory_service();
        let legacy = json!({
            "overall_score": 58.0,
            "sentiment": "NEUTRAL",
            "reliability": 0.7,
            "components": { "sentiment": 66 },
            "interpretations": {
                "sentiment": {
                    "sentiment": "Bullish",
                    "funding_rate": 0.0125,
                    "market_activity": "Volume picking up"
                }
            },
            "timestamp": 1_700_000_000,
            "score_history": [55.0, 58.0]
        });
        store
            .set_ex(
                "confluence:breakdown:SOLUSDT",
                &legacy.to_string(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let record = cache.get("SOLUSDT").await.expect("legacy entry decodes");
        let text = &record.interpretations["sentiment"];
        assert!(text.starts_with("Overall sentiment is bullish. Funding rate at 0.0125%. Volume picking up. "));
        assert!((record.reliability - 70.0).abs() < 1e-9);
        assert_eq!(record.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (store, cache) = memory_service();
        store
            .set_ex("confluence:breakdown:XRPUSDT", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get("XRPUSDT").await.is_none());
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_folds_into_false_and_none() {
        let cache = CacheService::new(Arc::new(DownStore), CacheConfig::default());
        assert!(!cache.put("BTCUSDT", &AnalysisResult::new(80.0)).await);
        assert!(cache.get("BTCUSDT").await.is_none());
        assert!(cache.get_score("BTCUSDT").await.is_none());
        assert!(!cache.invalidate("BTCUSDT").await);
        assert!(!cache.is_healthy().await);

        let stats = cache.stats();
        assert_eq!(stats.failed_writes, 1);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.backend, "down");
    }

    #[tokio::test]
    async fn test_get_many_skips_misses() {
        let (_, cache) = memory_service();
        cache.put("BTCUSDT", &AnalysisResult::new(71.0)).await;
        cache.put("ETHUSDT", &AnalysisResult::new(44.0)).await;

        let found = cache
            .get_many(&["btc/usdt".into(), "ETHUSDT".into(), "DOGEUSDT".into()])
            .await;
        assert_eq!(found.len(), 2);
        assert_eq!(found["BTCUSDT"].overall_score, 71.0);
        assert!(!found.contains_key("DOGEUSDT"));
    }

    #[tokio::test]
    async fn test_invalidate_removes_keys_and_history() {
        let (store, cache) = memory_service();
        cache.put("BTCUSDT", &AnalysisResult::new(71.0)).await;
        assert!(cache.invalidate("BTCUSDT").await);
        assert!(cache.get("BTCUSDT").await.is_none());
        assert!(store.get("confluence:score:BTCUSDT").await.unwrap().is_none());
        assert!(cache.history("BTCUSDT").is_empty());
    }

    #[tokio::test]
    async fn test_stats_hit_rate() {
        let (_, cache) = memory_service();
        cache.put("BTCUSDT", &AnalysisResult::new(71.0)).await;
        cache.get("BTCUSDT").await;
        cache.get("ETHUSDT").await;
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.tracked_symbols, 1);
    }
}
