//! Signal Aggregator
//!
//! Read-side composition for the dashboard: the tiered fallback cascade that
//! sources signals, per-symbol deduplication, breakdown enrichment and
//! opportunity ranking.

pub mod cascade;
pub mod dashboard;
pub mod dedup;
pub mod enrichment;
pub mod ranker;

pub use cascade::{
    DashboardProvider, DashboardView, DataSource, DirectCacheProvider, FallbackCascade,
    SharedCacheProvider, SignalReconstructionProvider,
};
pub use dashboard::{DashboardResponse, DashboardService, DashboardStatus};
pub use dedup::dedup_by_symbol;
pub use enrichment::enrich;
pub use ranker::{derive_opportunities, OpportunityRanker, RankingParams};
