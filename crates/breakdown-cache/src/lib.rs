//! Breakdown Cache
//!
//! TTL-backed storage of per-symbol breakdown records. The cache is an
//! optimization, never a source of truth: every failure below the
//! [`CacheService`] boundary reads as a miss or a skipped write.

pub mod config;
pub mod redis_store;
pub mod service;
pub mod store;

pub use config::{CacheBackend, CacheConfig};
pub use redis_store::RedisStore;
pub use service::{breakdown_key, score_key, BreakdownLookup, CacheService, CacheStats};
pub use store::{KeyValueStore, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

/// How often the in-memory backend sweeps expired entries
pub const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Open the configured backend at `url`.
pub async fn connect_store(
    config: &CacheConfig,
    url: &str,
) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory breakdown store");
            let store = Arc::new(MemoryStore::new());
            store.spawn_purger(MEMORY_PURGE_INTERVAL);
            Ok(store as Arc<dyn KeyValueStore>)
        }
        CacheBackend::Redis => {
            let store = RedisStore::connect(url, config.pool_size, config.op_timeout).await?;
            tracing::info!("Connected to Redis at {} (pool size {})", url, config.pool_size);
            Ok(Arc::new(store))
        }
    }
}
