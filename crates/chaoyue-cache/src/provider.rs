//! Cache manager that dispatches to the configured provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use chaoyue_core::config::cache::CacheConfig;
use chaoyue_core::error::AppError;
use chaoyue_core::result::AppResult;
use chaoyue_core::traits::cache::CacheProvider;
use chaoyue_core::types::{ChannelMessage, KeyTtl, Limit, ScoreRange};

/// Cache manager that wraps the configured cache provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// The inner cache provider.
    inner: Arc<dyn CacheProvider>,
    /// Name of the selected provider.
    kind: &'static str,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let (inner, kind): (Arc<dyn CacheProvider>, &'static str) = match config.provider.as_str()
        {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                (
                    Arc::new(crate::redis::RedisCacheProvider::new(
                        client,
                        config.redis.pubsub_buffer,
                    )),
                    "redis",
                )
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!(
                    max_capacity = config.memory.max_capacity,
                    "Initializing in-memory cache provider"
                );
                (
                    Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory)),
                    "memory",
                )
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner, kind })
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            inner: provider,
            kind: "custom",
        }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn CacheProvider {
        self.inner.as_ref()
    }

    /// Name of the selected provider (`"redis"`, `"memory"`, or `"custom"`).
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn get_set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<Option<Vec<u8>>> {
        self.inner.get_set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<u64> {
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        self.inner.delete_many(keys).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        self.inner.keys(pattern).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        self.inner.incr_by(key, delta).await
    }

    async fn incr_by_with_expiry(&self, key: &str, delta: i64, ttl: Duration) -> AppResult<i64> {
        self.inner.incr_by_with_expiry(key, delta, ttl).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> AppResult<KeyTtl> {
        self.inner.ttl(key).await
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> AppResult<bool> {
        self.inner.hset(key, field, value).await
    }

    async fn hset_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> AppResult<()> {
        self.inner.hset_many(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.hget(key, field).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<u64> {
        self.inner.hdel(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, Vec<u8>>> {
        self.inner.hgetall(key).await
    }

    async fn lpop(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.lpop(key).await
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> AppResult<u64> {
        self.inner.rpush(key, value).await
    }

    async fn llen(&self, key: &str) -> AppResult<u64> {
        self.inner.llen(key).await
    }

    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> AppResult<bool> {
        self.inner.zadd(key, member, score).await
    }

    async fn zrem(&self, key: &str, members: &[Vec<u8>]) -> AppResult<u64> {
        self.inner.zrem(key, members).await
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        self.inner.zcard(key).await
    }

    async fn zcount(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        self.inner.zcount(key, range).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        self.inner.zrange_by_score(key, range, limit).await
    }

    async fn zrevrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        self.inner.zrevrange_by_score(key, range, limit).await
    }

    async fn zrem_range_by_score(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        self.inner.zrem_range_by_score(key, range).await
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> AppResult<u64> {
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>> {
        self.inner.subscribe(channel).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
