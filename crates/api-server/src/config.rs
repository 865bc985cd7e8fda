use anyhow::Result;
use std::env;

use breakdown_cache::CacheConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Row cap for opportunity lists when the client does not send one
    pub default_limit: usize,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            default_limit: env::var("OPPORTUNITY_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            cache: CacheConfig::from_env()?,
        })
    }
}
