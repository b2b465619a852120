//! Core traits defined in `chaoyue-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
