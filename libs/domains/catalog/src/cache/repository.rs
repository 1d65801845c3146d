use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CacheError;

/// Default lifetime of a cached search or recommendation response
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Key/value response cache.
///
/// Errors are reported as [`CacheError`], which the services log and discard:
/// a failed read is a miss and a failed write is a no-op.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Read and decode a cached JSON value. Any failure counts as a miss.
pub async fn read_json<T: DeserializeOwned>(cache: &dyn SearchCache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(error = %err, cache_key = key, "cache read failed, treating as miss");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, cache_key = key, "discarding undecodable cache entry");
            None
        }
    }
}

/// Encode and store a JSON value. Failures are logged and dropped.
pub async fn write_json<T: Serialize>(cache: &dyn SearchCache, key: &str, value: &T, ttl: Duration) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, cache_key = key, "failed to encode cache entry");
            return;
        }
    };

    if let Err(err) = cache.set(key, &raw, ttl).await {
        tracing::warn!(error = %err, cache_key = key, "cache write failed");
    }
}
