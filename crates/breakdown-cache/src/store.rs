use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use breakdown_core::BreakdownResult;

/// Minimal TTL key/value surface the breakdown cache needs.
///
/// Implemented by Redis for deployments and by [`MemoryStore`] for local runs
/// and tests.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> BreakdownResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BreakdownResult<()>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> BreakdownResult<bool>;

    async fn ping(&self) -> BreakdownResult<()>;

    fn backend_name(&self) -> &'static str;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local store with lazy expiry
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Reads already ignore them; this only bounds memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Purge expired entries every `every` until the store is dropped.
    /// Keys that are never read again would otherwise stay in memory.
    pub fn spawn_purger(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!("Purged {} expired entries from memory store", purged);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BreakdownResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BreakdownResult<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> BreakdownResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn ping(&self) -> BreakdownResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
