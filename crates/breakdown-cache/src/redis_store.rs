use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use breakdown_core::{BreakdownError, BreakdownResult};

use crate::store::KeyValueStore;

/// Redis-backed store.
///
/// One multiplexed, auto-reconnecting connection is shared by every caller;
/// the semaphore caps in-flight commands at the configured pool size. Waiting
/// for a permit suspends only the calling task.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    permits: Arc<Semaphore>,
    op_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(
        url: &str,
        pool_size: usize,
        op_timeout: Duration,
    ) -> BreakdownResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BreakdownError::Config(format!("invalid redis url {}: {}", url, e)))?;
        let manager = tokio::time::timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| BreakdownError::Timeout(op_timeout.as_secs()))?
            .map_err(|e| BreakdownError::Transport(e.to_string()))?;

        Ok(Self {
            manager,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            op_timeout,
        })
    }

    async fn run<T, F, Fut>(&self, op: F) -> BreakdownResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| BreakdownError::Unavailable(e.to_string()))?;

        tokio::time::timeout(self.op_timeout, op(self.manager.clone()))
            .await
            .map_err(|_| BreakdownError::Timeout(self.op_timeout.as_secs()))?
            .map_err(|e| BreakdownError::Transport(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> BreakdownResult<Option<String>> {
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BreakdownResult<()> {
        let seconds = ttl.as_secs().max(1);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn delete(&self, key: &str) -> BreakdownResult<bool> {
        let removed: i64 = self
            .run(|mut conn| async move { conn.del::<_, i64>(key).await })
            .await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> BreakdownResult<()> {
        let _: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
