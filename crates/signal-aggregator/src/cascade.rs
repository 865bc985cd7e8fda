//! Read Fallback Cascade
//!
//! Dashboard data is sourced from an ordered list of tiers. The first tier
//! that answers in time with non-empty, non-fallback data wins outright;
//! results are never merged across tiers. A failed tier is skipped, not
//! retried.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use breakdown_cache::KeyValueStore;
use breakdown_core::{BreakdownError, BreakdownResult, Signal};

/// Key the shared dashboard cache publishes its snapshot under
pub const SHARED_DASHBOARD_KEY: &str = "dashboard:data";
/// Key the analysis pipeline publishes its latest signal list under
pub const DIRECT_SIGNALS_KEY: &str = "analysis:signals";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    PrimaryCache,
    DirectCache,
    SignalReconstruction,
    #[default]
    Unavailable,
}

/// What one tier produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_overview: Option<Value>,
    /// Set by a tier that is itself serving placeholder data
    #[serde(default)]
    pub fallback: bool,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub generated_at: i64,
}

impl DashboardView {
    pub fn from_signals(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            generated_at: Utc::now().timestamp(),
            ..Default::default()
        }
    }

    /// Explicit "no data" result when every tier failed
    pub fn unavailable() -> Self {
        Self {
            data_source: DataSource::Unavailable,
            generated_at: Utc::now().timestamp(),
            ..Default::default()
        }
    }

    pub fn is_adequate(&self) -> bool {
        !self.signals.is_empty() && !self.fallback
    }
}

/// One tier of the cascade
#[async_trait]
pub trait DashboardProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn source(&self) -> DataSource;

    async fn fetch(&self) -> BreakdownResult<DashboardView>;
}

/// Primary tier: full dashboard snapshot maintained by the shared cache
pub struct SharedCacheProvider {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SharedCacheProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, SHARED_DASHBOARD_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DashboardProvider for SharedCacheProvider {
    fn name(&self) -> &'static str {
        "shared_cache"
    }

    fn source(&self) -> DataSource {
        DataSource::PrimaryCache
    }

    async fn fetch(&self) -> BreakdownResult<DashboardView> {
        let raw = self
            .store
            .get(&self.key)
            .await?
            .ok_or_else(|| BreakdownError::Unavailable(format!("{} not present", self.key)))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Accepted shapes of the direct signal list
#[derive(Deserialize)]
#[serde(untagged)]
enum SignalPayload {
    List(Vec<Signal>),
    Wrapped {
        signals: Vec<Signal>,
        #[serde(default)]
        market_overview: Option<Value>,
    },
}

/// Secondary tier: raw signal list read straight from the cache
pub struct DirectCacheProvider {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl DirectCacheProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DIRECT_SIGNALS_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DashboardProvider for DirectCacheProvider {
    fn name(&self) -> &'static str {
        "direct_cache"
    }

    fn source(&self) -> DataSource {
        DataSource::DirectCache
    }

    async fn fetch(&self) -> BreakdownResult<DashboardView> {
        let raw = self
            .store
            .get(&self.key)
            .await?
            .ok_or_else(|| BreakdownError::Unavailable(format!("{} not present", self.key)))?;

        let view = match serde_json::from_str::<SignalPayload>(&raw)? {
            SignalPayload::List(signals) => DashboardView::from_signals(signals),
            SignalPayload::Wrapped {
                signals,
                market_overview,
            } => DashboardView {
                market_overview,
                ..DashboardView::from_signals(signals)
            },
        };
        Ok(view)
    }
}

/// Last tier: whatever signals the caller already holds
pub struct SignalReconstructionProvider {
    signals: Vec<Signal>,
}

impl SignalReconstructionProvider {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }
}

#[async_trait]
impl DashboardProvider for SignalReconstructionProvider {
    fn name(&self) -> &'static str {
        "signal_reconstruction"
    }

    fn source(&self) -> DataSource {
        DataSource::SignalReconstruction
    }

    async fn fetch(&self) -> BreakdownResult<DashboardView> {
        Ok(DashboardView::from_signals(self.signals.clone()))
    }
}

/// Ordered tiers with a per-tier timeout
#[derive(Clone)]
pub struct FallbackCascade {
    tiers: Vec<Arc<dyn DashboardProvider>>,
    tier_timeout: Duration,
}

impl FallbackCascade {
    pub fn new(tiers: Vec<Arc<dyn DashboardProvider>>, tier_timeout: Duration) -> Self {
        Self {
            tiers,
            tier_timeout,
        }
    }

    pub fn push(&mut self, tier: Arc<dyn DashboardProvider>) {
        self.tiers.push(tier);
    }

    /// Try each tier in order; never fails. When nothing adequate comes back
    /// the result is tagged [`DataSource::Unavailable`].
    pub async fn get_dashboard_data(&self) -> DashboardView {
        for tier in &self.tiers {
            match tokio::time::timeout(self.tier_timeout, tier.fetch()).await {
                Ok(Ok(mut view)) if view.is_adequate() => {
                    view.data_source = tier.source();
                    tracing::info!(
                        "Dashboard served from {} ({} signals)",
                        tier.name(),
                        view.signals.len()
                    );
                    return view;
                }
                Ok(Ok(view)) => tracing::warn!(
                    "Tier {} returned unusable data ({} signals, fallback={}), trying next",
                    tier.name(),
                    view.signals.len(),
                    view.fallback
                ),
                Ok(Err(e)) => tracing::warn!("Tier {} failed: {}, trying next", tier.name(), e),
                Err(_) => tracing::warn!(
                    "Tier {} timed out after {:?}, trying next",
                    tier.name(),
                    self.tier_timeout
                ),
            }
        }

        tracing::error!("All {} dashboard tiers failed, serving empty view", self.tiers.len());
        DashboardView::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakdown_cache::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingTier;

    #[async_trait]
    impl DashboardProvider for FailingTier {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn source(&self) -> DataSource {
            DataSource::PrimaryCache
        }
        async fn fetch(&self) -> BreakdownResult<DashboardView> {
            Err(BreakdownError::Transport("connection reset".into()))
        }
    }

    struct SlowTier;

    #[async_trait]
    impl DashboardProvider for SlowTier {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn source(&self) -> DataSource {
            DataSource::PrimaryCache
        }
        async fn fetch(&self) -> BreakdownResult<DashboardView> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(DashboardView::from_signals(vec![Signal::new("SLOWUSDT", 99.0)]))
        }
    }

    /// Records how often it was called
    struct CountingTier {
        calls: AtomicUsize,
        view: DashboardView,
    }

    #[async_trait]
    impl DashboardProvider for CountingTier {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn source(&self) -> DataSource {
            DataSource::DirectCache
        }
        async fn fetch(&self) -> BreakdownResult<DashboardView> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.view.clone())
        }
    }

    fn counting(view: DashboardView) -> Arc<CountingTier> {
        Arc::new(CountingTier {
            calls: AtomicUsize::new(0),
            view,
        })
    }

    fn tier<P: DashboardProvider + 'static>(provider: Arc<P>) -> Arc<dyn DashboardProvider> {
        provider
    }

    fn signals(symbols: &[&str]) -> Vec<Signal> {
        symbols.iter().map(|s| Signal::new(*s, 60.0)).collect()
    }

    #[test]
    fn test_default_view_is_unavailable() {
        assert_eq!(DataSource::default(), DataSource::Unavailable);
        let view = DashboardView::default();
        assert_eq!(view.data_source, DataSource::Unavailable);
        assert!(!view.is_adequate());
    }

    #[tokio::test]
    async fn test_first_adequate_tier_wins_without_merging() {
        let primary = counting(DashboardView::from_signals(signals(&["BTCUSDT"])));
        let secondary = counting(DashboardView::from_signals(signals(&["ETHUSDT"])));
        let cascade = FallbackCascade::new(
            vec![tier(primary.clone()), tier(secondary.clone())],
            Duration::from_secs(1),
        );

        let view = cascade.get_dashboard_data().await;
        assert_eq!(view.signals.len(), 1);
        assert_eq!(view.signals[0].symbol, "BTCUSDT");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_empty_and_flagged_tiers_fall_through() {
        let empty = counting(DashboardView::from_signals(vec![]));
        let flagged = counting(DashboardView {
            fallback: true,
            ..DashboardView::from_signals(signals(&["BTCUSDT"]))
        });
        let last = Arc::new(SignalReconstructionProvider::new(signals(&["SOLUSDT"])));
        let cascade = FallbackCascade::new(
            vec![
                tier(Arc::new(FailingTier)),
                tier(empty.clone()),
                tier(flagged.clone()),
                tier(last),
            ],
            Duration::from_secs(1),
        );

        let view = cascade.get_dashboard_data().await;
        assert_eq!(view.data_source, DataSource::SignalReconstruction);
        assert_eq!(view.signals[0].symbol, "SOLUSDT");
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(flagged.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_tier_is_skipped() {
        let cascade = FallbackCascade::new(
            vec![
                tier(Arc::new(SlowTier)),
                tier(Arc::new(SignalReconstructionProvider::new(signals(&["ETHUSDT"])))),
            ],
            Duration::from_millis(50),
        );
        let view = cascade.get_dashboard_data().await;
        assert_eq!(view.data_source, DataSource::SignalReconstruction);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_yields_unavailable() {
        let cascade = FallbackCascade::new(
            vec![
                tier(Arc::new(FailingTier)),
                tier(Arc::new(SignalReconstructionProvider::new(vec![]))),
            ],
            Duration::from_secs(1),
        );
        let view = cascade.get_dashboard_data().await;
        assert_eq!(view.data_source, DataSource::Unavailable);
        assert!(view.signals.is_empty());
    }

    #[tokio::test]
    async fn test_cache_backed_tiers() {
        let store = Arc::new(MemoryStore::new());
        let shared = SharedCacheProvider::new(store.clone());
        let direct = DirectCacheProvider::new(store.clone());

        assert!(matches!(shared.fetch().await, Err(BreakdownError::Unavailable(_))));

        store
            .set_ex(SHARED_DASHBOARD_KEY, "not json", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(shared.fetch().await, Err(BreakdownError::Decode(_))));

        store
            .set_ex(
                SHARED_DASHBOARD_KEY,
                r#"{"signals":[{"symbol":"BTCUSDT","score":71}],"market_overview":{"regime":"trend"}}"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let view = shared.fetch().await.unwrap();
        assert_eq!(view.signals[0].score, 71.0);
        assert!(view.market_overview.is_some());

        store
            .set_ex(
                DIRECT_SIGNALS_KEY,
                r#"[{"symbol":"ETHUSDT","score":64,"change_24h":1.2}]"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let view = direct.fetch().await.unwrap();
        assert_eq!(view.signals[0].symbol, "ETHUSDT");

        store
            .set_ex(
                DIRECT_SIGNALS_KEY,
                r#"{"signals":[{"symbol":"XRPUSDT","score":52}]}"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let view = direct.fetch().await.unwrap();
        assert_eq!(view.signals[0].symbol, "XRPUSDT");
    }
}
