//! Breakdown API Routes
//!
//! Read, write and invalidate cached breakdowns for one symbol.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use breakdown_cache::CacheStats;
use breakdown_core::{AnalysisResult, BreakdownRecord, ScoreSnapshot, Symbol};

use crate::{ApiResponse, AppError, AppState};

#[derive(Serialize)]
pub struct PutResponse {
    pub symbol: String,
    pub cached: bool,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub history: Vec<f64>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub symbols: Vec<String>,
}

pub fn breakdown_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/breakdown/:symbol",
            get(get_breakdown).post(put_breakdown).delete(invalidate_breakdown),
        )
        .route("/api/breakdown/:symbol/score", get(get_score))
        .route("/api/breakdown/:symbol/history", get(get_history))
        .route("/api/breakdowns", post(get_breakdowns))
        .route("/api/cache/stats", get(get_stats))
}

fn parse_symbol(raw: &str) -> Result<Symbol, AppError> {
    let symbol = Symbol::new(raw);
    if symbol.is_empty() {
        return Err(AppError::BadRequest(format!("Invalid symbol '{}'", raw)));
    }
    Ok(symbol)
}

/// Latest breakdown; `data: null` on a miss
async fn get_breakdown(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<BreakdownRecord>>, AppError> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(match state.cache.get(symbol.as_str()).await {
        Some(record) => ApiResponse::success(record),
        None => ApiResponse::empty(),
    }))
}

async fn put_breakdown(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(result): Json<AnalysisResult>,
) -> Result<Json<ApiResponse<PutResponse>>, AppError> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state.cache.put(symbol.as_str(), &result).await;
    Ok(Json(ApiResponse::success(PutResponse {
        symbol: symbol.to_string(),
        cached,
    })))
}

async fn invalidate_breakdown(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(ApiResponse::success(
        state.cache.invalidate(symbol.as_str()).await,
    )))
}

async fn get_score(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<ScoreSnapshot>>, AppError> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(match state.cache.get_score(symbol.as_str()).await {
        Some(snapshot) => ApiResponse::success(snapshot),
        None => ApiResponse::empty(),
    }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<HistoryResponse>>, AppError> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(ApiResponse::success(HistoryResponse {
        history: state.cache.history(symbol.as_str()),
        symbol: symbol.to_string(),
    })))
}

async fn get_breakdowns(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Json<ApiResponse<HashMap<String, BreakdownRecord>>> {
    Json(ApiResponse::success(
        state.cache.get_many(&request.symbols).await,
    ))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    Json(ApiResponse::success(state.cache.stats()))
}
