use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use breakdown_cache::BreakdownLookup;
use breakdown_core::{EnrichedSignal, Opportunity, Signal};

use crate::cascade::{DashboardProvider, DataSource, FallbackCascade, SignalReconstructionProvider};
use crate::dedup::dedup_by_symbol;
use crate::enrichment::enrich;
use crate::ranker::OpportunityRanker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardStatus {
    /// Served from a cache tier
    Live,
    /// Rebuilt from the caller's own signals
    Degraded,
    /// Every tier failed
    NoData,
}

impl From<DataSource> for DashboardStatus {
    fn from(source: DataSource) -> Self {
        match source {
            DataSource::PrimaryCache | DataSource::DirectCache => DashboardStatus::Live,
            DataSource::SignalReconstruction => DashboardStatus::Degraded,
            DataSource::Unavailable => DashboardStatus::NoData,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub data_source: DataSource,
    pub status: DashboardStatus,
    pub signals: Vec<EnrichedSignal>,
    pub opportunities: Vec<Opportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_overview: Option<Value>,
    pub generated_at: i64,
}

/// Composes cascade, dedup, enrichment and ranking for dashboard reads.
pub struct DashboardService {
    lookup: Arc<dyn BreakdownLookup>,
    tiers: Vec<Arc<dyn DashboardProvider>>,
    tier_timeout: Duration,
    ranker: OpportunityRanker,
}

impl DashboardService {
    pub fn new(
        lookup: Arc<dyn BreakdownLookup>,
        tiers: Vec<Arc<dyn DashboardProvider>>,
        tier_timeout: Duration,
    ) -> Self {
        Self {
            lookup,
            tiers,
            tier_timeout,
            ranker: OpportunityRanker::new(),
        }
    }

    /// Full dashboard read. `fallback_signals` are whatever the caller already
    /// has and back the last cascade tier.
    pub async fn dashboard(&self, fallback_signals: Vec<Signal>, limit: usize) -> DashboardResponse {
        let mut cascade = FallbackCascade::new(self.tiers.clone(), self.tier_timeout);
        cascade.push(Arc::new(SignalReconstructionProvider::new(fallback_signals)));

        let view = cascade.get_dashboard_data().await;
        let signals = dedup_by_symbol(view.signals);
        let opportunities = self.ranker.derive(&signals, limit);
        let enriched = enrich(self.lookup.as_ref(), &signals).await;

        DashboardResponse {
            data_source: view.data_source,
            status: view.data_source.into(),
            signals: enriched,
            opportunities,
            market_overview: view.market_overview,
            generated_at: Utc::now().timestamp(),
        }
    }

    pub async fn enrich(&self, signals: &[Signal]) -> Vec<EnrichedSignal> {
        enrich(self.lookup.as_ref(), signals).await
    }

    /// Dedup then rank, for signal lists merged from several sources
    pub fn opportunities(&self, signals: Vec<Signal>, limit: usize) -> Vec<Opportunity> {
        self.ranker.derive(&dedup_by_symbol(signals), limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{DirectCacheProvider, SharedCacheProvider, DIRECT_SIGNALS_KEY};
    use breakdown_cache::{CacheConfig, CacheService, KeyValueStore, MemoryStore};
    use breakdown_core::AnalysisResult;

    async fn setup() -> (Arc<MemoryStore>, Arc<CacheService>, DashboardService) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CacheService::new(store.clone(), CacheConfig::default()));
        let tiers = vec![
            Arc::new(SharedCacheProvider::new(store.clone())) as Arc<dyn DashboardProvider>,
            Arc::new(DirectCacheProvider::new(store.clone())) as Arc<dyn DashboardProvider>,
        ];
        let service = DashboardService::new(cache.clone(), tiers, Duration::from_secs(1));
        (store, cache, service)
    }

    #[tokio::test]
    async fn test_degrades_to_caller_signals() {
        let (_, cache, service) = setup().await;
        cache.put("ETHUSDT", &AnalysisResult::new(80.0)).await;

        let response = service
            .dashboard(
                vec![
                    Signal::new("ETHUSDT", 40.0),
                    Signal::new("ETHUSDT", 80.0).with_change(12.0),
                    Signal::new("SOLUSDT", 90.0).with_change(0.0),
                ],
                5,
            )
            .await;

        assert_eq!(response.data_source, DataSource::SignalReconstruction);
        assert_eq!(response.status, DashboardStatus::Degraded);
        assert_eq!(response.signals.len(), 2);
        assert_eq!(response.signals[0].signal.symbol, "SOLUSDT");
        assert!(!response.signals[0].has_breakdown);
        assert!(response.signals[1].has_breakdown);
        assert_eq!(response.opportunities[0].symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn test_direct_tier_preferred_over_caller_signals() {
        let (store, _, service) = setup().await;
        store
            .set_ex(
                DIRECT_SIGNALS_KEY,
                r#"[{"symbol":"BTCUSDT","score":77,"change_24h":2.0,"volume_24h":3500000}]"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let response = service.dashboard(vec![Signal::new("DOGEUSDT", 99.0)], 5).await;
        assert_eq!(response.status, DashboardStatus::Live);
        assert_eq!(response.signals.len(), 1);
        assert_eq!(response.opportunities[0].volume_label, "$3.5M");
    }

    #[tokio::test]
    async fn test_no_data_shape() {
        let (_, _, service) = setup().await;
        let response = service.dashboard(vec![], 5).await;
        assert_eq!(response.status, DashboardStatus::NoData);
        assert!(response.signals.is_empty());
        assert!(response.opportunities.is_empty());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data_source"], "unavailable");
        assert_eq!(json["status"], "no_data");
    }

    #[tokio::test]
    async fn test_opportunities_dedups_first() {
        let (_, _, service) = setup().await;
        let ranked = service.opportunities(
            vec![Signal::new("XUSDT", 40.0), Signal::new("XUSDT", 70.0)],
            5,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 70.0);
    }
}
