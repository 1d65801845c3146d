use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::SearchCache;
use crate::error::CacheError;

/// [`SearchCache`] on a shared Redis connection manager
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Open a connection manager and verify it with `PING`
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        info!("Connecting to Redis at {}", url);

        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        let cache = Self::new(manager);
        cache.ping().await?;

        info!("Successfully connected to Redis");
        Ok(cache)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response != "PONG" {
            return Err(CacheError(format!("unexpected PING response: {}", response)));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        // SET EX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a running Redis
    async fn test_round_trip_preserves_bytes() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache = RedisCache::connect(&url).await.unwrap();
        let value = r#"{"results":[],"total":0,"query_type":"text","note":"ünïcödé"}"#;

        cache
            .set("search:test-round-trip", value, Duration::from_secs(5))
            .await
            .unwrap();
        let cached = cache.get("search:test-round-trip").await.unwrap();

        assert_eq!(cached.as_deref(), Some(value));
    }

    #[tokio::test]
    async fn test_connect_failure_is_a_cache_error() {
        let result = RedisCache::connect("redis://127.0.0.1:1").await;
        assert!(result.is_err());
    }
}
