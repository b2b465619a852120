//! # chaoyue-cache
//!
//! Namespaced cache facade over pluggable store providers:
//!
//! - **redis**: Redis-backed provider using the [redis](https://crates.io/crates/redis) crate
//! - **memory**: in-process provider using [moka](https://crates.io/crates/moka)
//!
//! The provider is selected at runtime based on configuration and
//! wrapped by [`NamespacedCache`], which applies the key prefix, encodes
//! values, and logs failures before returning them.

pub mod facade;
pub mod keys;
pub mod listener;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use facade::NamespacedCache;
pub use keys::KeyPrefix;
pub use listener::{LoggingListener, MessageListener, spawn_listener};
pub use provider::CacheManager;
