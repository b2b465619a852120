//! Facade behaviour against the in-memory provider.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chaoyue_core::error::ErrorKind;
use chaoyue_core::traits::cache::CacheProvider;
use chaoyue_core::types::{KeyTtl, Limit, ScoreRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    status: String,
}

#[tokio::test]
async fn test_put_string_then_get_string() {
    let cache = common::memory_cache();
    cache
        .put_string("chaoyue_string", "chaoyue_string_value1", Some(Duration::from_secs(1000)))
        .await
        .unwrap();

    let value = cache.get_string("chaoyue_string").await.unwrap();
    assert_eq!(value.as_deref(), Some("chaoyue_string_value1"));
}

#[tokio::test]
async fn test_keys_are_stored_under_prefix() {
    let cache = common::memory_cache();
    cache.put_string("user:1", "alice", None).await.unwrap();

    let raw = cache.provider().get("chaoyue:user:1").await.unwrap();
    assert_eq!(raw, Some(b"alice".to_vec()));
    assert_eq!(cache.provider().get("user:1").await.unwrap(), None);
}

#[tokio::test]
async fn test_typed_round_trip() {
    let cache = common::memory_cache();
    let order = Order {
        id: 42,
        status: "paid".to_string(),
    };
    cache.put_default("order:42", &order).await.unwrap();

    let loaded: Option<Order> = cache.get("order:42").await.unwrap();
    assert_eq!(loaded, Some(order));
    assert!(cache.ttl("order:42").await.unwrap().remaining().is_some());
}

#[tokio::test]
async fn test_get_with_wrong_shape_is_serialization_error() {
    let cache = common::memory_cache();
    cache.put_string("order:1", "not json", None).await.unwrap();

    let err = cache.get::<Order>("order:1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Serialization);
}

#[tokio::test]
async fn test_value_with_ttl_is_absent_after_expiry() {
    let cache = common::memory_cache();
    cache
        .put_string("session", "token", Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(cache.exists("session").await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get_string("session").await.unwrap(), None);
}

#[tokio::test]
async fn test_zero_ttl_stores_without_expiry() {
    let cache = common::memory_cache();
    cache
        .put_string("forever", "v", Some(Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(cache.ttl("forever").await.unwrap(), KeyTtl::Persistent);
}

#[tokio::test]
async fn test_delete() {
    let cache = common::memory_cache();
    cache.put_string("chaoyue_string", "v", None).await.unwrap();

    assert!(cache.delete("chaoyue_string").await.unwrap());
    assert!(!cache.delete("chaoyue_string").await.unwrap());
    assert_eq!(cache.get_string("chaoyue_string").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_many() {
    let cache = common::memory_cache();
    cache.put_string("a", "1", None).await.unwrap();
    cache.put_string("b", "2", None).await.unwrap();

    assert_eq!(cache.delete_many(&["a", "b", "c"]).await.unwrap(), 2);
    assert_eq!(cache.delete_many::<&str>(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_keys_strip_prefix() {
    let cache = common::memory_cache();
    cache.put_string("user:1", "a", None).await.unwrap();
    cache.put_string("user:2", "b", None).await.unwrap();
    cache.put_string("order:1", "c", None).await.unwrap();
    cache
        .provider()
        .set("elsewhere:user:3", b"d", None)
        .await
        .unwrap();

    assert_eq!(cache.keys("user:*").await.unwrap(), vec!["user:1", "user:2"]);
}

#[tokio::test]
async fn test_increment_counts_within_window() {
    let cache = common::memory_cache();
    for expected in 1..=10 {
        let count = cache
            .increment("chaoyue_counter", 1, Duration::from_secs(100))
            .await
            .unwrap();
        assert_eq!(count, expected);
    }
    assert!(cache.ttl("chaoyue_counter").await.unwrap().remaining().is_some());
}

#[tokio::test]
async fn test_increment_resets_after_window() {
    let cache = common::memory_cache();
    let window = Duration::from_millis(80);
    cache.increment("burst", 1, window).await.unwrap();
    assert_eq!(cache.increment("burst", 1, window).await.unwrap(), 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cache.increment("burst", 1, window).await.unwrap(), 1);
}

#[tokio::test]
async fn test_increment_zero_window_still_expires() {
    let cache = common::memory_cache();
    cache.increment("zero", 3, Duration::ZERO).await.unwrap();

    let remaining = cache.ttl("zero").await.unwrap().remaining().unwrap();
    assert!(remaining <= Duration::from_secs(1));
}

#[tokio::test]
async fn test_incr_by_and_get_set() {
    let cache = common::memory_cache();
    assert_eq!(cache.incr_by("seq", 5).await.unwrap(), 5);
    assert_eq!(cache.ttl("seq").await.unwrap(), KeyTtl::Persistent);

    let previous = cache
        .get_set_bytes("seq", b"0", Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(previous, Some(b"5".to_vec()));
    assert_eq!(cache.incr_by("seq", 1).await.unwrap(), 1);
}

#[tokio::test]
async fn test_expire_missing_key() {
    let cache = common::memory_cache();
    assert!(!cache.expire("ghost", Duration::from_secs(5)).await.unwrap());
    assert_eq!(cache.ttl("ghost").await.unwrap(), KeyTtl::Missing);
}

#[tokio::test]
async fn test_expire_zero_makes_key_persistent() {
    let cache = common::memory_cache();
    cache
        .put_string("k", "v", Some(Duration::from_secs(30)))
        .await
        .unwrap();

    assert!(cache.expire("k", Duration::ZERO).await.unwrap());
    assert!(cache.exists("k").await.unwrap());
    assert_eq!(cache.ttl("k").await.unwrap(), KeyTtl::Persistent);
    assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn test_hash_operations() {
    let cache = common::memory_cache();
    assert!(cache.hash_set("order:7", "status", "created").await.unwrap());

    let mut fields = HashMap::new();
    fields.insert("status".to_string(), "paid".to_string());
    fields.insert("channel".to_string(), "web".to_string());
    cache.hash_set_all("order:7", &fields).await.unwrap();

    let status: Option<String> = cache.hash_get("order:7", "status").await.unwrap();
    assert_eq!(status.as_deref(), Some("paid"));

    let all: HashMap<String, String> = cache.hash_get_all("order:7").await.unwrap();
    assert_eq!(all, fields);

    assert_eq!(cache.hash_delete("order:7", &["channel", "missing"]).await.unwrap(), 1);
    assert_eq!(cache.hash_delete::<&str>("order:7", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_queue() {
    let cache = common::memory_cache();
    cache.list_push("jobs", b"first").await.unwrap();
    assert_eq!(cache.list_push("jobs", b"second").await.unwrap(), 2);
    assert_eq!(cache.list_len("jobs").await.unwrap(), 2);

    assert_eq!(cache.list_pop("jobs").await.unwrap(), Some(b"first".to_vec()));
    assert_eq!(cache.list_pop("jobs").await.unwrap(), Some(b"second".to_vec()));
    assert_eq!(cache.list_pop("jobs").await.unwrap(), None);
}

#[tokio::test]
async fn test_sorted_set_leaderboard() {
    let cache = common::memory_cache();
    cache.zset_add("board", b"ann", 30.0).await.unwrap();
    cache.zset_add("board", b"bob", 10.0).await.unwrap();
    cache.zset_add("board", b"cid", 20.0).await.unwrap();

    assert_eq!(cache.zset_len("board").await.unwrap(), 3);
    assert_eq!(
        cache
            .zset_count("board", ScoreRange::new(15.0, 30.0))
            .await
            .unwrap(),
        2
    );

    let top = cache
        .zset_rev_range_by_score("board", ScoreRange::all(), Some(Limit::new(0, 2)))
        .await
        .unwrap();
    assert_eq!(top, vec![b"ann".to_vec(), b"cid".to_vec()]);

    let low = cache
        .zset_range_by_score("board", ScoreRange::new(0.0, 25.0), None)
        .await
        .unwrap();
    assert_eq!(low, vec![b"bob".to_vec(), b"cid".to_vec()]);

    assert_eq!(
        cache
            .zset_remove_range_by_score("board", ScoreRange::new(0.0, 15.0))
            .await
            .unwrap(),
        1
    );
    assert_eq!(cache.zset_remove("board", &[b"ann".to_vec()]).await.unwrap(), 1);
    assert_eq!(cache.zset_remove("board", &[]).await.unwrap(), 0);
    assert_eq!(cache.zset_len("board").await.unwrap(), 1);
}

#[tokio::test]
async fn test_wrong_type_propagates() {
    let cache = common::memory_cache();
    cache.list_push("queue", b"x").await.unwrap();

    let err = cache.get_string("queue").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cache);
}

#[tokio::test]
async fn test_publish_reaches_subscriber() {
    let cache = common::memory_cache();
    let mut rx = cache.subscribe("chaoyue_channel").await.unwrap();

    let receivers = cache.publish("chaoyue_channel", "chaoyue_value_1").await.unwrap();
    assert_eq!(receivers, 1);

    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.channel, "chaoyue_channel");
    assert_eq!(msg.payload_str().unwrap(), "chaoyue_value_1");

    cache
        .publish_json("chaoyue_channel", &serde_json::json!({"orderId": 9}))
        .await
        .unwrap();
    let body: serde_json::Value = rx.recv().await.unwrap().json().unwrap();
    assert_eq!(body["orderId"], 9);
}
