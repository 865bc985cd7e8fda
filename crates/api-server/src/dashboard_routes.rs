//! Dashboard API Routes
//!
//! Aggregated dashboard reads plus signal enrichment and opportunity ranking
//! for callers that bring their own signal lists.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use breakdown_core::{EnrichedSignal, Opportunity, Signal};
use signal_aggregator::DashboardResponse;

use crate::{ApiResponse, AppState};

/// Hard ceiling on requested list sizes
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_LIMIT)
    }
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/signals/enrich", post(enrich_signals))
        .route("/api/signals/opportunities", post(rank_opportunities))
}

/// Always answers; an exhausted cascade shows up as `status: no_data`
async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<ApiResponse<DashboardResponse>> {
    let limit = query.resolve(state.default_limit);
    Json(ApiResponse::success(
        state.dashboard.dashboard(Vec::new(), limit).await,
    ))
}

async fn enrich_signals(
    State(state): State<AppState>,
    Json(signals): Json<Vec<Signal>>,
) -> Json<ApiResponse<Vec<EnrichedSignal>>> {
    Json(ApiResponse::success(state.dashboard.enrich(&signals).await))
}

async fn rank_opportunities(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
    Json(signals): Json<Vec<Signal>>,
) -> Json<ApiResponse<Vec<Opportunity>>> {
    let limit = query.resolve(state.default_limit);
    Json(ApiResponse::success(
        state.dashboard.opportunities(signals, limit),
    ))
}
