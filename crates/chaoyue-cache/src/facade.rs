//! Namespaced cache facade.
//!
//! [`NamespacedCache`] is what application code talks to. It prefixes
//! every key, encodes typed values as JSON, and delegates to a
//! [`CacheProvider`]. Store failures are logged here, once, and then
//! returned to the caller unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, error};

use chaoyue_core::config::cache::CacheConfig;
use chaoyue_core::result::AppResult;
use chaoyue_core::traits::cache::CacheProvider;
use chaoyue_core::types::{ChannelMessage, KeyTtl, Limit, ScoreRange, normalize_ttl};

use crate::keys::KeyPrefix;
use crate::provider::CacheManager;

/// Shortest window a rate counter may use.
const MIN_COUNTER_WINDOW: Duration = Duration::from_secs(1);

/// Cache facade bound to one key prefix.
#[derive(Debug, Clone)]
pub struct NamespacedCache {
    provider: Arc<dyn CacheProvider>,
    prefix: KeyPrefix,
    default_ttl: Option<Duration>,
}

impl NamespacedCache {
    /// Create a facade over `provider`. Values stored through
    /// [`put_default`](Self::put_default) never expire until a default TTL
    /// is set.
    pub fn new(provider: Arc<dyn CacheProvider>, prefix: KeyPrefix) -> Self {
        Self {
            provider,
            prefix,
            default_ttl: None,
        }
    }

    /// Connect the configured provider and wrap it.
    pub async fn from_config(config: &CacheConfig) -> AppResult<Self> {
        let manager = CacheManager::new(config).await?;
        Ok(Self::new(Arc::new(manager), KeyPrefix::new(config.key_prefix.as_str()))
            .with_default_ttl(Some(Duration::from_secs(config.default_ttl_seconds))))
    }

    /// Set the TTL used by [`put_default`](Self::put_default).
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = normalize_ttl(ttl);
        self
    }

    /// The key prefix.
    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    /// The default TTL, if any.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// The underlying provider.
    pub fn provider(&self) -> &dyn CacheProvider {
        self.provider.as_ref()
    }

    // ── Strings ────────────────────────────────────────────────

    /// Store a value as JSON.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let result: AppResult<()> = async {
            let bytes = serde_json::to_vec(value)?;
            self.provider.set(&self.prefix.apply(key), &bytes, ttl).await
        }
        .await;
        logged("put", key, result)
    }

    /// Store a value as JSON with the default TTL.
    pub async fn put_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AppResult<()> {
        self.put(key, value, self.default_ttl).await
    }

    /// Store a UTF-8 string verbatim.
    pub async fn put_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.put_bytes(key, value.as_bytes(), ttl).await
    }

    /// Store raw bytes.
    pub async fn put_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        let result = self.provider.set(&self.prefix.apply(key), value, ttl).await;
        logged("put", key, result)
    }

    /// Read a JSON value.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let result: AppResult<Option<T>> = async {
            let raw = self.provider.get(&self.prefix.apply(key)).await?;
            Ok(raw.map(|bytes| serde_json::from_slice(&bytes)).transpose()?)
        }
        .await;
        logged("get", key, result)
    }

    /// Read a UTF-8 string.
    pub async fn get_string(&self, key: &str) -> AppResult<Option<String>> {
        let result: AppResult<Option<String>> = async {
            let raw = self.provider.get(&self.prefix.apply(key)).await?;
            Ok(raw.map(String::from_utf8).transpose()?)
        }
        .await;
        logged("get_string", key, result)
    }

    /// Read raw bytes.
    pub async fn get_bytes(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let result = self.provider.get(&self.prefix.apply(key)).await;
        logged("get_bytes", key, result)
    }

    /// Replace a value and return the previous one.
    pub async fn get_set_bytes(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<Option<Vec<u8>>> {
        let result = self
            .provider
            .get_set(&self.prefix.apply(key), value, ttl)
            .await;
        logged("get_set", key, result)
    }

    // ── Keys ───────────────────────────────────────────────────

    /// Delete a key. Returns `true` if it existed.
    pub async fn delete(&self, key: &str) -> AppResult<bool> {
        let result = self.provider.delete(&self.prefix.apply(key)).await;
        logged("delete", key, result).map(|removed| removed > 0)
    }

    /// Delete several keys. Returns how many existed.
    pub async fn delete_many<S: AsRef<str>>(&self, keys: &[S]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let full_keys = self.prefix.apply_all(keys);
        let result = self.provider.delete_many(&full_keys).await;
        logged("delete_many", &format!("{} keys", keys.len()), result)
    }

    /// Whether a key exists.
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let result = self.provider.exists(&self.prefix.apply(key)).await;
        logged("exists", key, result)
    }

    /// Keys inside the namespace matching a glob pattern, without the prefix.
    pub async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let result = self.provider.keys(&self.prefix.pattern(pattern)).await;
        let full_keys = logged("keys", pattern, result)?;
        Ok(full_keys
            .iter()
            .filter_map(|k| self.prefix.strip(k))
            .map(str::to_string)
            .collect())
    }

    /// Set the TTL of an existing key. A zero TTL makes the key persistent.
    /// Returns `false` if the key is missing.
    pub async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let result = self.provider.expire(&self.prefix.apply(key), ttl).await;
        logged("expire", key, result)
    }

    /// Remaining lifetime of a key.
    pub async fn ttl(&self, key: &str) -> AppResult<KeyTtl> {
        let result = self.provider.ttl(&self.prefix.apply(key)).await;
        logged("ttl", key, result)
    }

    // ── Counters ───────────────────────────────────────────────

    /// Count an event inside a time window.
    ///
    /// Adds `delta` to the counter and resets its expiry to `window`, so
    /// the counter disappears once no event has been counted for a whole
    /// window. A zero window is raised to one second.
    pub async fn increment(&self, key: &str, delta: i64, window: Duration) -> AppResult<i64> {
        let window = if window.is_zero() {
            MIN_COUNTER_WINDOW
        } else {
            window
        };
        let result = self
            .provider
            .incr_by_with_expiry(&self.prefix.apply(key), delta, window)
            .await;
        let count = logged("increment", key, result)?;
        debug!(key, count, window_ms = window.as_millis() as u64, "Counter incremented");
        Ok(count)
    }

    /// Add `delta` to a counter without touching its expiry.
    pub async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        let result = self.provider.incr_by(&self.prefix.apply(key), delta).await;
        logged("incr_by", key, result)
    }

    // ── Hashes ─────────────────────────────────────────────────

    /// Set one hash field to a JSON value. Returns `true` if the field is new.
    pub async fn hash_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> AppResult<bool> {
        let result: AppResult<bool> = async {
            let bytes = serde_json::to_vec(value)?;
            self.provider
                .hset(&self.prefix.apply(key), field, &bytes)
                .await
        }
        .await;
        logged("hash_set", key, result)
    }

    /// Set several hash fields to JSON values.
    pub async fn hash_set_all<T: Serialize>(
        &self,
        key: &str,
        fields: &HashMap<String, T>,
    ) -> AppResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let result: AppResult<()> = async {
            let encoded = fields
                .iter()
                .map(|(field, value)| -> AppResult<(String, Vec<u8>)> {
                    Ok((field.clone(), serde_json::to_vec(value)?))
                })
                .collect::<AppResult<Vec<_>>>()?;
            self.provider
                .hset_many(&self.prefix.apply(key), &encoded)
                .await
        }
        .await;
        logged("hash_set_all", key, result)
    }

    /// Read one hash field.
    pub async fn hash_get<T: DeserializeOwned>(&self, key: &str, field: &str) -> AppResult<Option<T>> {
        let result: AppResult<Option<T>> = async {
            let raw = self.provider.hget(&self.prefix.apply(key), field).await?;
            Ok(raw.map(|bytes| serde_json::from_slice(&bytes)).transpose()?)
        }
        .await;
        logged("hash_get", key, result)
    }

    /// Delete hash fields. Returns how many existed.
    pub async fn hash_delete<S: AsRef<str>>(&self, key: &str, fields: &[S]) -> AppResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let result = self.provider.hdel(&self.prefix.apply(key), &fields).await;
        logged("hash_delete", key, result)
    }

    /// Read every field of a hash.
    pub async fn hash_get_all<T: DeserializeOwned>(&self, key: &str) -> AppResult<HashMap<String, T>> {
        let result: AppResult<HashMap<String, T>> = async {
            let raw = self.provider.hgetall(&self.prefix.apply(key)).await?;
            raw.into_iter()
                .map(|(field, bytes)| -> AppResult<(String, T)> {
                    Ok((field, serde_json::from_slice(&bytes)?))
                })
                .collect()
        }
        .await;
        logged("hash_get_all", key, result)
    }

    // ── Lists ──────────────────────────────────────────────────

    /// Append to the tail of a list. Returns the new length.
    pub async fn list_push(&self, key: &str, value: &[u8]) -> AppResult<u64> {
        let result = self.provider.rpush(&self.prefix.apply(key), value).await;
        logged("list_push", key, result)
    }

    /// Pop from the head of a list.
    pub async fn list_pop(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let result = self.provider.lpop(&self.prefix.apply(key)).await;
        logged("list_pop", key, result)
    }

    /// Length of a list.
    pub async fn list_len(&self, key: &str) -> AppResult<u64> {
        let result = self.provider.llen(&self.prefix.apply(key)).await;
        logged("list_len", key, result)
    }

    // ── Sorted sets ────────────────────────────────────────────

    /// Add a member or update its score. Returns `true` if it is new.
    pub async fn zset_add(&self, key: &str, member: &[u8], score: f64) -> AppResult<bool> {
        let result = self
            .provider
            .zadd(&self.prefix.apply(key), member, score)
            .await;
        logged("zset_add", key, result)
    }

    /// Remove members. Returns how many existed.
    pub async fn zset_remove(&self, key: &str, members: &[Vec<u8>]) -> AppResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let result = self.provider.zrem(&self.prefix.apply(key), members).await;
        logged("zset_remove", key, result)
    }

    /// Number of members.
    pub async fn zset_len(&self, key: &str) -> AppResult<u64> {
        let result = self.provider.zcard(&self.prefix.apply(key)).await;
        logged("zset_len", key, result)
    }

    /// Number of members with a score in `range`.
    pub async fn zset_count(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        let result = self.provider.zcount(&self.prefix.apply(key), range).await;
        logged("zset_count", key, result)
    }

    /// Members with a score in `range`, lowest first.
    pub async fn zset_range_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let result = self
            .provider
            .zrange_by_score(&self.prefix.apply(key), range, limit)
            .await;
        logged("zset_range_by_score", key, result)
    }

    /// Members with a score in `range`, highest first.
    pub async fn zset_rev_range_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let result = self
            .provider
            .zrevrange_by_score(&self.prefix.apply(key), range, limit)
            .await;
        logged("zset_rev_range_by_score", key, result)
    }

    /// Remove members with a score in `range`. Returns how many were removed.
    pub async fn zset_remove_range_by_score(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        let result = self
            .provider
            .zrem_range_by_score(&self.prefix.apply(key), range)
            .await;
        logged("zset_remove_range_by_score", key, result)
    }

    // ── Pub/sub ────────────────────────────────────────────────

    /// Publish a text message. Channel names are not prefixed.
    pub async fn publish(&self, channel: &str, message: &str) -> AppResult<u64> {
        let result = self.provider.publish(channel, message.as_bytes()).await;
        let receivers = logged("publish", channel, result)?;
        debug!(channel, receivers, "Published message");
        Ok(receivers)
    }

    /// Publish a value encoded as JSON.
    pub async fn publish_json<T: Serialize + ?Sized>(&self, channel: &str, message: &T) -> AppResult<u64> {
        let result: AppResult<u64> = async {
            let payload = serde_json::to_vec(message)?;
            self.provider.publish(channel, &payload).await
        }
        .await;
        logged("publish", channel, result)
    }

    /// Subscribe to a channel.
    pub async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>> {
        let result = self.provider.subscribe(channel).await;
        logged("subscribe", channel, result)
    }

    /// Whether the store answers.
    pub async fn health_check(&self) -> AppResult<bool> {
        let result = self.provider.health_check().await;
        logged("health_check", "", result)
    }
}

/// Log a failed operation before handing the error back.
fn logged<T>(op: &'static str, key: &str, result: AppResult<T>) -> AppResult<T> {
    result.inspect_err(|e| error!(op, key, kind = %e.kind, error = %e, "Cache operation failed"))
}
