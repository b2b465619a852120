//! In-memory cache implementation using the moka crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use chaoyue_core::config::cache::MemoryCacheConfig;
use chaoyue_core::error::AppError;
use chaoyue_core::result::AppResult;
use chaoyue_core::traits::cache::CacheProvider;
use chaoyue_core::types::{ChannelMessage, KeyTtl, Limit, ScoreRange, normalize_ttl};

use super::glob::glob_match;
use super::pubsub::MemoryPubSub;
use super::value::{Entry, EntryExpiry, StoredValue, deadline};

/// In-memory cache provider using moka.
///
/// Entries carry their own deadline; moka evicts them once it passes and
/// reads double-check it. Read-modify-write operations run under a
/// single async mutex, which makes them atomic with respect to each
/// other within this process.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, Entry>,
    /// Serializes mutations.
    write_lock: Arc<Mutex<()>>,
    /// In-process pub/sub channels.
    pubsub: Arc<MemoryPubSub>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    ///
    /// At capacity the least recently used key is evicted; new writes are
    /// always admitted, like Redis `allkeys-lru`.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();

        Self {
            cache,
            write_lock: Arc::new(Mutex::new(())),
            pubsub: Arc::new(MemoryPubSub::new(config.pubsub_buffer)),
        }
    }

    /// Fetch an entry if it exists and has not expired.
    async fn live(&self, key: &str) -> Option<Entry> {
        self.cache
            .get(key)
            .await
            .filter(|entry| entry.is_live(Instant::now()))
    }

    /// Run a read-modify-write step under the write lock.
    ///
    /// `f` receives the current live entry and returns the replacement
    /// (`None` deletes the key) together with the operation's result.
    /// Empty collections are deleted rather than stored.
    async fn update<T, F>(&self, key: &str, f: F) -> AppResult<T>
    where
        F: FnOnce(Option<Entry>) -> AppResult<(Option<Entry>, T)> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let current = self.live(key).await;
        let (next, out) = f(current)?;
        match next {
            Some(entry) if !entry.value.is_empty_collection() => {
                self.cache.insert(key.to_string(), entry).await;
            }
            _ => self.cache.invalidate(key).await,
        }
        Ok(out)
    }

    fn parse_counter(value: Option<Vec<u8>>) -> AppResult<i64> {
        match value {
            None => Ok(0),
            Some(raw) => std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| AppError::cache("ERR value is not an integer or out of range")),
        }
    }

    fn add_counter(current: i64, delta: i64) -> AppResult<i64> {
        current
            .checked_add(delta)
            .ok_or_else(|| AppError::cache("ERR increment or decrement would overflow"))
    }

    /// Members of a sorted set in ascending (score, member) order.
    fn sorted_members(zset: &HashMap<Vec<u8>, f64>) -> Vec<(&Vec<u8>, f64)> {
        let mut members: Vec<_> = zset.iter().map(|(m, s)| (m, *s)).collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        members
    }

    fn apply_limit(members: Vec<Vec<u8>>, limit: Option<Limit>) -> Vec<Vec<u8>> {
        match limit {
            Some(limit) => members
                .into_iter()
                .skip(usize::try_from(limit.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit.count).unwrap_or(usize::MAX))
                .collect(),
            None => members,
        }
    }

    async fn sorted_set(&self, key: &str) -> AppResult<HashMap<Vec<u8>, f64>> {
        Entry::into_sorted_set(self.live(key).await).map(|(z, _)| z)
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        Entry::into_bytes(self.live(key).await).map(|(value, _)| value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        let entry = Entry::new(
            StoredValue::Bytes(value.to_vec()),
            normalize_ttl(ttl).and_then(deadline),
        );
        self.update(key, |_| Ok((Some(entry), ()))).await
    }

    async fn get_set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<Option<Vec<u8>>> {
        let entry = Entry::new(
            StoredValue::Bytes(value.to_vec()),
            normalize_ttl(ttl).and_then(deadline),
        );
        self.update(key, |current| {
            let (previous, _) = Entry::into_bytes(current)?;
            Ok((Some(entry), previous))
        })
        .await
    }

    async fn delete(&self, key: &str) -> AppResult<u64> {
        self.update(key, |current| Ok((None, u64::from(current.is_some()))))
            .await
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        let mut removed = 0;
        for key in keys {
            removed += self.delete(key).await?;
        }
        debug!(requested = keys.len(), removed, "Deleted keys");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.live(key).await.is_some())
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();

        debug!(pattern, count = keys.len(), "Scanned keys matching pattern");
        Ok(keys)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        self.update(key, |current| {
            let (value, expires_at) = Entry::into_bytes(current)?;
            let next = Self::add_counter(Self::parse_counter(value)?, delta)?;
            let entry = Entry::new(StoredValue::Bytes(next.to_string().into_bytes()), expires_at);
            Ok((Some(entry), next))
        })
        .await
    }

    async fn incr_by_with_expiry(&self, key: &str, delta: i64, ttl: Duration) -> AppResult<i64> {
        let expires_at = deadline(ttl);
        self.update(key, |current| {
            let (value, _) = Entry::into_bytes(current)?;
            let next = Self::add_counter(Self::parse_counter(value)?, delta)?;
            let entry = Entry::new(StoredValue::Bytes(next.to_string().into_bytes()), expires_at);
            Ok((Some(entry), next))
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.update(key, |current| match current {
            None => Ok((None, false)),
            Some(mut entry) => {
                entry.expires_at = normalize_ttl(Some(ttl)).and_then(deadline);
                Ok((Some(entry), true))
            }
        })
        .await
    }

    async fn ttl(&self, key: &str) -> AppResult<KeyTtl> {
        Ok(match self.live(key).await {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> AppResult<bool> {
        self.update(key, |current| {
            let (mut hash, expires_at) = Entry::into_hash(current)?;
            let created = hash.insert(field.to_string(), value.to_vec()).is_none();
            Ok((Some(Entry::new(StoredValue::Hash(hash), expires_at)), created))
        })
        .await
    }

    async fn hset_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> AppResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.update(key, |current| {
            let (mut hash, expires_at) = Entry::into_hash(current)?;
            hash.extend(fields.iter().cloned());
            Ok((Some(Entry::new(StoredValue::Hash(hash), expires_at)), ()))
        })
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>> {
        let (mut hash, _) = Entry::into_hash(self.live(key).await)?;
        Ok(hash.remove(field))
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.update(key, |current| {
            let exists = current.is_some();
            let (mut hash, expires_at) = Entry::into_hash(current)?;
            let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count() as u64;
            let next = exists.then(|| Entry::new(StoredValue::Hash(hash), expires_at));
            Ok((next, removed))
        })
        .await
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, Vec<u8>>> {
        Entry::into_hash(self.live(key).await).map(|(hash, _)| hash)
    }

    async fn lpop(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.update(key, |current| {
            let exists = current.is_some();
            let (mut list, expires_at) = Entry::into_list(current)?;
            let popped = list.pop_front();
            let next = exists.then(|| Entry::new(StoredValue::List(list), expires_at));
            Ok((next, popped))
        })
        .await
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> AppResult<u64> {
        self.update(key, |current| {
            let (mut list, expires_at) = Entry::into_list(current)?;
            list.push_back(value.to_vec());
            let len = list.len() as u64;
            Ok((Some(Entry::new(StoredValue::List(list), expires_at)), len))
        })
        .await
    }

    async fn llen(&self, key: &str) -> AppResult<u64> {
        Entry::into_list(self.live(key).await).map(|(list, _)| list.len() as u64)
    }

    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> AppResult<bool> {
        if score.is_nan() {
            return Err(AppError::validation("Sorted set score must not be NaN"));
        }
        self.update(key, |current| {
            let (mut zset, expires_at) = Entry::into_sorted_set(current)?;
            let added = zset.insert(member.to_vec(), score).is_none();
            Ok((Some(Entry::new(StoredValue::SortedSet(zset), expires_at)), added))
        })
        .await
    }

    async fn zrem(&self, key: &str, members: &[Vec<u8>]) -> AppResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.update(key, |current| {
            let exists = current.is_some();
            let (mut zset, expires_at) = Entry::into_sorted_set(current)?;
            let removed = members.iter().filter(|m| zset.remove(*m).is_some()).count() as u64;
            let next = exists.then(|| Entry::new(StoredValue::SortedSet(zset), expires_at));
            Ok((next, removed))
        })
        .await
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        Ok(self.sorted_set(key).await?.len() as u64)
    }

    async fn zcount(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        let zset = self.sorted_set(key).await?;
        Ok(zset.values().filter(|s| range.contains(**s)).count() as u64)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let zset = self.sorted_set(key).await?;
        let members = Self::sorted_members(&zset)
            .into_iter()
            .filter(|(_, score)| range.contains(*score))
            .map(|(member, _)| member.clone())
            .collect();
        Ok(Self::apply_limit(members, limit))
    }

    async fn zrevrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let zset = self.sorted_set(key).await?;
        let members = Self::sorted_members(&zset)
            .into_iter()
            .rev()
            .filter(|(_, score)| range.contains(*score))
            .map(|(member, _)| member.clone())
            .collect();
        Ok(Self::apply_limit(members, limit))
    }

    async fn zrem_range_by_score(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        self.update(key, |current| {
            let exists = current.is_some();
            let (mut zset, expires_at) = Entry::into_sorted_set(current)?;
            let before = zset.len();
            zset.retain(|_, score| !range.contains(*score));
            let removed = (before - zset.len()) as u64;
            let next = exists.then(|| Entry::new(StoredValue::SortedSet(zset), expires_at));
            Ok((next, removed))
        })
        .await
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> AppResult<u64> {
        Ok(self.pubsub.publish(channel, payload))
    }

    async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>> {
        Ok(self.pubsub.subscribe(channel))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaoyue_core::error::ErrorKind;

    fn make_provider() -> MemoryCacheProvider {
        let config = MemoryCacheConfig {
            max_capacity: 1000,
            pubsub_buffer: 16,
        };
        MemoryCacheProvider::new(&config)
    }

    #[tokio::test]
    async fn test_set_get() {
        let provider = make_provider();
        provider.set("key1", b"value1", None).await.unwrap();
        let val = provider.get("key1").await.unwrap();
        assert_eq!(val, Some(b"value1".to_vec()));
        assert_eq!(provider.ttl("key1").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_value_expires() {
        let provider = make_provider();
        provider
            .set("short", b"v", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(provider.exists("short").await.unwrap());
        assert!(matches!(
            provider.ttl("short").await.unwrap(),
            KeyTtl::Expires(_)
        ));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(provider.get("short").await.unwrap(), None);
        assert_eq!(provider.ttl("short").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_zero_ttl_means_no_expiry() {
        let provider = make_provider();
        provider
            .set("forever", b"v", Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(provider.ttl("forever").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = make_provider();
        provider.set("key2", b"value2", None).await.unwrap();
        assert_eq!(provider.delete("key2").await.unwrap(), 1);
        assert_eq!(provider.delete("key2").await.unwrap(), 0);
        assert_eq!(provider.get("key2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_many_counts_existing_keys() {
        let provider = make_provider();
        provider.set("a", b"1", None).await.unwrap();
        provider.set("b", b"2", None).await.unwrap();
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(provider.delete_many(&keys).await.unwrap(), 2);
        assert_eq!(provider.delete_many(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_set_returns_previous() {
        let provider = make_provider();
        assert_eq!(provider.get_set("gs", b"one", None).await.unwrap(), None);
        let previous = provider
            .get_set("gs", b"two", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(previous, Some(b"one".to_vec()));
        assert_eq!(provider.get("gs").await.unwrap(), Some(b"two".to_vec()));
        assert!(provider.ttl("gs").await.unwrap().remaining().is_some());
    }

    #[tokio::test]
    async fn test_incr_by() {
        let provider = make_provider();
        assert_eq!(provider.incr_by("counter", 1).await.unwrap(), 1);
        assert_eq!(provider.incr_by("counter", 5).await.unwrap(), 6);
        assert_eq!(provider.incr_by("counter", -2).await.unwrap(), 4);
        assert_eq!(provider.get("counter").await.unwrap(), Some(b"4".to_vec()));
    }

    #[tokio::test]
    async fn test_incr_by_keeps_existing_expiry() {
        let provider = make_provider();
        provider
            .set("hits", b"10", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(provider.incr_by("hits", 1).await.unwrap(), 11);
        assert!(provider.ttl("hits").await.unwrap().remaining().is_some());
    }

    #[tokio::test]
    async fn test_incr_non_integer_fails() {
        let provider = make_provider();
        provider.set("name", b"chaoyue", None).await.unwrap();
        let err = provider.incr_by("name", 1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);
        assert_eq!(
            provider.get("name").await.unwrap(),
            Some(b"chaoyue".to_vec())
        );
    }

    #[tokio::test]
    async fn test_incr_with_expiry_window_resets() {
        let provider = make_provider();
        let window = Duration::from_millis(60);
        assert_eq!(
            provider.incr_by_with_expiry("rate", 1, window).await.unwrap(),
            1
        );
        assert_eq!(
            provider.incr_by_with_expiry("rate", 1, window).await.unwrap(),
            2
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            provider.incr_by_with_expiry("rate", 1, window).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_expire() {
        let provider = make_provider();
        assert!(!provider.expire("nope", Duration::from_secs(1)).await.unwrap());

        provider.set("k", b"v", None).await.unwrap();
        assert!(provider.expire("k", Duration::from_secs(30)).await.unwrap());
        let remaining = provider.ttl("k").await.unwrap().remaining().unwrap();
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(25));

        assert!(provider.expire("k", Duration::ZERO).await.unwrap());
        assert_eq!(provider.ttl("k").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_new_keys_admitted_at_capacity() {
        let config = MemoryCacheConfig {
            max_capacity: 4,
            pubsub_buffer: 16,
        };
        let provider = MemoryCacheProvider::new(&config);

        for i in 0..4 {
            provider.set(&format!("hot{i}"), b"v", None).await.unwrap();
        }
        for _ in 0..50 {
            for i in 0..4 {
                provider.get(&format!("hot{i}")).await.unwrap();
            }
        }

        for i in 0..20 {
            let key = format!("rate{i}");
            assert_eq!(provider.incr_by(&key, 1).await.unwrap(), 1);
            assert_eq!(provider.incr_by(&key, 1).await.unwrap(), 2, "lost increment on {key}");
        }
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let provider = make_provider();
        provider.set("chaoyue:user:1", b"a", None).await.unwrap();
        provider.set("chaoyue:user:2", b"b", None).await.unwrap();
        provider.set("chaoyue:order:1", b"c", None).await.unwrap();

        let keys = provider.keys("chaoyue:user:*").await.unwrap();
        assert_eq!(keys, vec!["chaoyue:user:1", "chaoyue:user:2"]);
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let provider = make_provider();
        assert!(provider.hset("h", "name", b"alice").await.unwrap());
        assert!(!provider.hset("h", "name", b"bob").await.unwrap());
        provider
            .hset_many(
                "h",
                &[
                    ("age".to_string(), b"30".to_vec()),
                    ("city".to_string(), b"sh".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            provider.hget("h", "name").await.unwrap(),
            Some(b"bob".to_vec())
        );
        assert_eq!(provider.hgetall("h").await.unwrap().len(), 3);

        let removed = provider
            .hdel("h", &["age".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        provider
            .hdel("h", &["name".to_string(), "city".to_string()])
            .await
            .unwrap();
        assert!(!provider.exists("h").await.unwrap());
        assert!(provider.hgetall("h").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_operations() {
        let provider = make_provider();
        assert_eq!(provider.rpush("q", b"first").await.unwrap(), 1);
        assert_eq!(provider.rpush("q", b"second").await.unwrap(), 2);
        assert_eq!(provider.llen("q").await.unwrap(), 2);
        assert_eq!(provider.lpop("q").await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(provider.lpop("q").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(provider.lpop("q").await.unwrap(), None);
        assert!(!provider.exists("q").await.unwrap());
    }

    #[tokio::test]
    async fn test_sorted_set_operations() {
        let provider = make_provider();
        assert!(provider.zadd("z", b"a", 1.0).await.unwrap());
        assert!(provider.zadd("z", b"b", 2.0).await.unwrap());
        assert!(provider.zadd("z", b"c", 3.0).await.unwrap());
        assert!(!provider.zadd("z", b"c", 4.0).await.unwrap());

        assert_eq!(provider.zcard("z").await.unwrap(), 3);
        assert_eq!(
            provider.zcount("z", ScoreRange::new(2.0, 4.0)).await.unwrap(),
            2
        );

        let asc = provider
            .zrange_by_score("z", ScoreRange::all(), None)
            .await
            .unwrap();
        assert_eq!(asc, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let desc = provider
            .zrevrange_by_score("z", ScoreRange::all(), Some(Limit::new(1, 1)))
            .await
            .unwrap();
        assert_eq!(desc, vec![b"b".to_vec()]);

        assert_eq!(
            provider
                .zrem_range_by_score("z", ScoreRange::new(0.0, 1.5))
                .await
                .unwrap(),
            1
        );
        assert_eq!(provider.zrem("z", &[b"b".to_vec()]).await.unwrap(), 1);
        assert_eq!(provider.zcard("z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let provider = make_provider();
        provider.rpush("list", b"x").await.unwrap();
        let err = provider.hget("list", "f").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);
        assert!(err.message.starts_with("WRONGTYPE"));
        assert!(provider.get("list").await.is_err());
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let provider = make_provider();
        assert_eq!(provider.publish("events", b"nobody").await.unwrap(), 0);

        let mut rx = provider.subscribe("events").await.unwrap();
        assert_eq!(provider.publish("events", b"hello").await.unwrap(), 1);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.payload_str().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_health_check() {
        let provider = make_provider();
        assert!(provider.health_check().await.unwrap());
    }
}
