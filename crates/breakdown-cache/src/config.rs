use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

use breakdown_core::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Store read by the primary dashboard tier; defaults to `redis_url`
    pub shared_cache_url: Option<String>,
    pub pool_size: usize,
    pub breakdown_ttl: Duration,
    pub score_ttl: Duration,
    pub history_capacity: usize,
    /// Upper bound on a single store command
    pub op_timeout: Duration,
    /// Upper bound on one dashboard fallback tier
    pub tier_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            shared_cache_url: None,
            pool_size: 16,
            breakdown_ttl: Duration::from_secs(300),
            score_ttl: Duration::from_secs(900),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            op_timeout: Duration::from_secs(2),
            tier_timeout: Duration::from_secs(3),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let backend = match env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => CacheBackend::Redis,
            "memory" => CacheBackend::Memory,
            other => bail!("Unknown CACHE_BACKEND '{}' (expected redis or memory)", other),
        };

        let config = Self {
            backend,
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            shared_cache_url: env::var("SHARED_CACHE_URL").ok().filter(|s| !s.is_empty()),
            pool_size: env::var("CACHE_POOL_SIZE")
                .unwrap_or_else(|_| "16".to_string())
                .parse()?,
            breakdown_ttl: Duration::from_secs(
                env::var("BREAKDOWN_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            ),
            score_ttl: Duration::from_secs(
                env::var("SCORE_TTL_SECS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()?,
            ),
            history_capacity: env::var("SCORE_HISTORY_CAPACITY")
                .unwrap_or_else(|_| DEFAULT_HISTORY_CAPACITY.to_string())
                .parse()?,
            op_timeout: Duration::from_secs(
                env::var("CACHE_OP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
            ),
            tier_timeout: Duration::from_secs(
                env::var("TIER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            bail!("CACHE_POOL_SIZE must be at least 1");
        }
        if self.history_capacity == 0 {
            bail!("SCORE_HISTORY_CAPACITY must be at least 1");
        }
        if self.breakdown_ttl.is_zero() || self.score_ttl.is_zero() {
            bail!("Cache TTLs must be non-zero");
        }
        Ok(())
    }

    pub fn shared_cache_url(&self) -> &str {
        self.shared_cache_url.as_deref().unwrap_or(&self.redis_url)
    }
}
