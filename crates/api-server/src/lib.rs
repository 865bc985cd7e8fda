//! Breakdown API server
//!
//! Thin HTTP shell over the breakdown cache and dashboard aggregation. Every
//! handler is a plain call into the core plus JSON serialization.

pub mod breakdown_routes;
pub mod config;
pub mod dashboard_routes;
pub mod request_id;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use breakdown_cache::{connect_store, CacheService};
use signal_aggregator::{
    DashboardProvider, DashboardService, DirectCacheProvider, SharedCacheProvider,
};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
    pub dashboard: Arc<DashboardService>,
    pub default_limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Successful call that found nothing; not an error for a cache
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(err) => {
                tracing::error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    store_reachable: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_reachable = state.cache.is_healthy().await;
    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" },
        backend: state.cache.store().backend_name(),
        store_reachable,
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(breakdown_routes::breakdown_routes())
        .merge(dashboard_routes::dashboard_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting breakdown API server");
    tracing::info!("  Backend: {:?}", config.cache.backend);
    tracing::info!(
        "  TTLs: breakdown {}s, score {}s",
        config.cache.breakdown_ttl.as_secs(),
        config.cache.score_ttl.as_secs()
    );
    tracing::info!("  Tier timeout: {}s", config.cache.tier_timeout.as_secs());

    let store = connect_store(&config.cache, &config.cache.redis_url).await?;
    let shared_store = if config.cache.shared_cache_url() == config.cache.redis_url {
        store.clone()
    } else {
        connect_store(&config.cache, config.cache.shared_cache_url()).await?
    };

    let cache = Arc::new(CacheService::new(store.clone(), config.cache.clone()));
    let tiers = vec![
        Arc::new(SharedCacheProvider::new(shared_store)) as Arc<dyn DashboardProvider>,
        Arc::new(DirectCacheProvider::new(store.clone())) as Arc<dyn DashboardProvider>,
    ];
    let dashboard = Arc::new(DashboardService::new(
        cache.clone(),
        tiers,
        config.cache.tier_timeout,
    ));

    let state = AppState {
        cache,
        dashboard,
        default_limit: config.default_limit,
    };
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use breakdown_cache::{CacheBackend, CacheConfig, MemoryStore};

    let config = CacheConfig {
        backend: CacheBackend::Memory,
        ..Default::default()
    };
    let store: Arc<dyn breakdown_cache::KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheService::new(store.clone(), config.clone()));
    let tiers = vec![
        Arc::new(SharedCacheProvider::new(store.clone())) as Arc<dyn DashboardProvider>,
        Arc::new(DirectCacheProvider::new(store)) as Arc<dyn DashboardProvider>,
    ];
    let dashboard = Arc::new(DashboardService::new(cache.clone(), tiers, config.tier_timeout));
    AppState {
        cache,
        dashboard,
        default_limit: 10,
    }
}
