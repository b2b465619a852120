//! # chaoyue-core
//!
//! Core crate for the chaoyue cache. Contains the [`CacheProvider`]
//! trait every backend implements, configuration schemas, the value
//! types exchanged with the store (TTL answers, score ranges, channel
//! messages), and the unified error system.
//!
//! This crate has **no** internal dependencies on other chaoyue crates.
//!
//! [`CacheProvider`]: traits::CacheProvider

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
