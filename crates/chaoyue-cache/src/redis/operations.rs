//! Redis cache provider implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use chaoyue_core::error::{AppError, ErrorKind};
use chaoyue_core::result::AppResult;
use chaoyue_core::traits::cache::CacheProvider;
use chaoyue_core::types::{ChannelMessage, KeyTtl, Limit, ScoreRange, normalize_ttl, ttl_millis};

use super::client::RedisClient;
use super::pubsub::RedisPubSub;

/// Number of keys requested per SCAN round trip.
const SCAN_BATCH: u64 = 500;

/// INCRBY then PEXPIRE. An INCRBY error aborts the script, so a key that
/// is not a counter never gains an expiry.
static INCR_WITH_EXPIRY: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local count = redis.call('INCRBY', KEYS[1], ARGV[1])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
return count
",
    )
});

/// Redis-backed cache provider.
#[derive(Debug, Clone)]
pub struct RedisCacheProvider {
    /// Redis client.
    client: RedisClient,
    /// Channel subscriptions.
    pubsub: RedisPubSub,
}

impl RedisCacheProvider {
    /// Create a new Redis cache provider.
    ///
    /// `pubsub_buffer` bounds how many messages each subscribed channel
    /// queues for slow receivers.
    pub fn new(client: RedisClient, pubsub_buffer: usize) -> Self {
        let pubsub = RedisPubSub::new(client.client().clone(), pubsub_buffer);
        Self { client, pubsub }
    }

    /// The channel subscription registry.
    pub fn pubsub(&self) -> &RedisPubSub {
        &self.pubsub
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }

    /// Build a `ZRANGEBYSCORE`-style command with an optional `LIMIT`.
    fn range_cmd(name: &str, key: &str, from: String, to: String, limit: Option<Limit>) -> redis::Cmd {
        let mut cmd = redis::cmd(name);
        cmd.arg(key).arg(from).arg(to);
        if let Some(limit) = limit {
            cmd.arg("LIMIT").arg(limit.offset).arg(limit.count);
        }
        cmd
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = normalize_ttl(ttl) {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn get_set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        // SET .. GET fails on a non-string key without touching it.
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("GET");
        if let Some(ttl) = normalize_ttl(ttl) {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd.query_async(&mut conn).await.map_err(Self::map_err)
    }

    async fn delete(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let removed: u64 = cmd.query_async(&mut conn).await.map_err(Self::map_err)?;
        debug!(requested = keys.len(), removed, "Deleted keys");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = self.client.conn_mut();

        // SCAN may report a key more than once; collect into a set.
        let mut found = BTreeSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, count = found.len(), "Scanned keys matching pattern");
        Ok(found.into_iter().collect())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn incr_by_with_expiry(&self, key: &str, delta: i64, ttl: Duration) -> AppResult<i64> {
        let mut conn = self.client.conn_mut();
        INCR_WITH_EXPIRY
            .key(key)
            .arg(delta)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        match normalize_ttl(Some(ttl)) {
            Some(ttl) => redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err),
            None => {
                // PERSIST replies 0 for keys without a TTL, so ask EXISTS.
                let (exists,): (bool,) = redis::pipe()
                    .atomic()
                    .cmd("PERSIST")
                    .arg(key)
                    .ignore()
                    .cmd("EXISTS")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(Self::map_err)?;
                Ok(exists)
            }
        }
    }

    async fn ttl(&self, key: &str) -> AppResult<KeyTtl> {
        let mut conn = self.client.conn_mut();
        let reply: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(KeyTtl::from_millis_reply(reply))
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let created: u64 = redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(created > 0)
    }

    async fn hset_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> AppResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value.as_slice());
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field);
        }
        cmd.query_async(&mut conn).await.map_err(Self::map_err)
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn lpop(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("LPOP")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn llen(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let added: u64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(added > 0)
    }

    async fn zrem(&self, key: &str, members: &[Vec<u8>]) -> AppResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(key);
        for member in members {
            cmd.arg(member.as_slice());
        }
        cmd.query_async(&mut conn).await.map_err(Self::map_err)
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn zcount(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("ZCOUNT")
            .arg(key)
            .arg(range.min_arg())
            .arg(range.max_arg())
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        Self::range_cmd("ZRANGEBYSCORE", key, range.min_arg(), range.max_arg(), limit)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn zrevrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        limit: Option<Limit>,
    ) -> AppResult<Vec<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        // ZREVRANGEBYSCORE takes max before min.
        Self::range_cmd("ZREVRANGEBYSCORE", key, range.max_arg(), range.min_arg(), limit)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn zrem_range_by_score(&self, key: &str, range: ScoreRange) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(range.min_arg())
            .arg(range.max_arg())
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>> {
        self.pubsub.subscribe(channel).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
