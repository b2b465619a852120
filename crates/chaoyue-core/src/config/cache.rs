//! Cache provider configuration.

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Prefix prepended to every key handled by the facade.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Default TTL for cached entries in seconds. `0` stores without expiry.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Redis-specific cache configuration.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            key_prefix: default_key_prefix(),
            default_ttl_seconds: default_ttl(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Logical database index. Overrides any database in `url`.
    #[serde(default)]
    pub database: Option<u32>,
    /// Timeout for establishing the initial connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Per-channel buffer between a Redis subscription and its local
    /// receivers.
    #[serde(default = "default_pubsub_buffer")]
    pub pubsub_buffer: usize,
}

impl RedisCacheConfig {
    /// The URL to connect with, with the configured database applied.
    pub fn connection_url(&self) -> String {
        match self.database {
            Some(db) => with_database(&self.url, db),
            None => self.url.clone(),
        }
    }
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            database: None,
            connect_timeout_seconds: default_connect_timeout(),
            pubsub_buffer: default_pubsub_buffer(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of keys held before eviction.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Per-channel buffer for in-process pub/sub.
    #[serde(default = "default_pubsub_buffer")]
    pub pubsub_buffer: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            pubsub_buffer: default_pubsub_buffer(),
        }
    }
}

/// Replace the database path segment of a `redis://` URL.
///
/// `redis://host:6379/0?protocol=resp3` with db `2` becomes
/// `redis://host:6379/2?protocol=resp3`.
fn with_database(url: &str, db: u32) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let authority_start = base.find("://").map(|p| p + 3).unwrap_or(0);
    let authority = match base[authority_start..].find('/') {
        Some(slash) => &base[..authority_start + slash],
        None => base,
    };

    match query {
        Some(query) => format!("{authority}/{db}?{query}"),
        None => format!("{authority}/{db}"),
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_key_prefix() -> String {
    "chaoyue:".to_string()
}

fn default_ttl() -> u64 {
    300
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_capacity() -> u64 {
    10000
}

fn default_pubsub_buffer() -> usize {
    256
}
