//! Shared helpers for facade integration tests.

use std::sync::Arc;
use std::time::Duration;

use chaoyue_cache::memory::MemoryCacheProvider;
use chaoyue_cache::{KeyPrefix, NamespacedCache};
use chaoyue_core::config::cache::MemoryCacheConfig;

/// A facade over a fresh in-memory provider with the default prefix.
#[allow(dead_code)]
pub fn memory_cache() -> NamespacedCache {
    let provider = MemoryCacheProvider::new(&MemoryCacheConfig::default());
    NamespacedCache::new(Arc::new(provider), KeyPrefix::default())
        .with_default_ttl(Some(Duration::from_secs(60)))
}

/// Redis URL for ignored tests that need a live server.
#[allow(dead_code)]
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}
