//! Cache provider trait for pluggable store backends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::result::AppResult;
use crate::types::{ChannelMessage, KeyTtl, Limit, ScoreRange};

/// Trait for cache backends (Redis or in-memory).
///
/// Keys are passed through verbatim: namespacing is the caller's job.
/// Values are raw bytes. Each method maps onto a single store primitive
/// and reports store failures as [`AppError`](crate::AppError) values.
///
/// A `ttl` of `None` or zero stores the value without expiry.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Set a value, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()>;

    /// Set a value and return the one it replaced.
    ///
    /// When `ttl` is given the key expiry is reset to it; otherwise the
    /// key is left without expiry.
    async fn get_set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<Option<Vec<u8>>>;

    /// Delete a key. Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> AppResult<u64>;

    /// Delete several keys at once. Returns the number of keys removed.
    async fn delete_many(&self, keys: &[String]) -> AppResult<u64>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// List keys matching a glob pattern (e.g., `"session:*"`).
    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>>;

    /// Increment an integer value by `delta`, creating it at 0 first.
    /// Returns the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64>;

    /// Increment an integer value and set its expiry in one step.
    async fn incr_by_with_expiry(&self, key: &str, delta: i64, ttl: Duration) -> AppResult<i64>;

    /// Set the TTL on an existing key. A zero TTL removes any expiry.
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> AppResult<KeyTtl>;

    /// Set a hash field. Returns `true` if the field was newly created.
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> AppResult<bool>;

    /// Set several hash fields at once.
    async fn hset_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> AppResult<()>;

    /// Get a hash field.
    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>>;

    /// Delete hash fields. Returns the number of fields removed.
    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<u64>;

    /// Get every field of a hash. A missing key yields an empty map.
    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, Vec<u8>>>;

    /// Remove and return the first element of a list.
    async fn lpop(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Append an element to a list. Returns the new list length.
    async fn rpush(&self, key: &str, value: &[u8]) -> AppResult<u64>;

    /// Length of a list.
    async fn llen(&self, key: &str) -> AppResult<u64>;

    /// Add a member to a sorted set, or update its score.
    /// Returns `true` if the member was newly added.
    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> AppResult<bool>;

    /// Remove members from a sorted set. Returns the number removed.
    async fn zrem(&self, key: &str, members: &[Vec<u8>]) -> AppResult<u64>;

    /// Number of members in a sorted set.
    async fn zcard(&self, key: &str) -> AppResult<u64>;

    /// Number of members whose score falls in `range`.
    async fn zcount(&self, key: &str, range: ScoreRange) -> AppResult<u64>;

    /// Members with scores in `range`, lowest score first.
    async fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>>;

    /// Members with scores in `range`, highest score first.
    async fn zrevrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>>;

    /// Remove members with scores in `range`. Returns the number removed.
    async fn zrem_range_by_score(&self, key: &str, range: ScoreRange) -> AppResult<u64>;

    /// Publish a message. Returns the number of subscribers that received it.
    async fn publish(&self, channel: &str, payload: &[u8]) -> AppResult<u64>;

    /// Subscribe to a channel.
    async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>>;

    /// Check that the cache backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
