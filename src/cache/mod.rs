//! Time-bounded key/value cache in front of the repository.
//!
//! Values are JSON strings. The cache is a derived view: any error or
//! undecodable entry is treated as a miss by the callers, never as a fault.

mod memory;
mod redis_backend;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryCache;
pub use redis_backend::RedisCache;

/// Key of the unscoped device listing
pub const ALL_DEVICES_KEY: &str = "devices:all";

/// Key of the cached network interface listing
pub const NETWORK_INTERFACES_KEY: &str = "networkInterfaces";

/// Key of the per-interface device listing
pub fn devices_key(interface_id: i64) -> String {
    format!("devices:{}", interface_id)
}

/// Cache backend contract. No compare-and-swap: the last writer wins.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

/// Read and decode a JSON value. Undecodable entries are logged and reported as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Encode and store a JSON value under a TTL
pub async fn set_json<T: Serialize + ?Sized>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl).await
}

/// Build the configured backend: Redis when a URL is given, in-process memory otherwise
pub async fn from_config(redis_url: &str) -> Result<Arc<dyn Cache>> {
    if redis_url.trim().is_empty() {
        tracing::info!("Cache backend: in-memory");
        return Ok(Arc::new(MemoryCache::new()));
    }

    let cache = RedisCache::connect(redis_url).await?;
    tracing::info!("Cache backend: redis");
    Ok(Arc::new(cache))
}
