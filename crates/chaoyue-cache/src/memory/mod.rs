//! In-memory cache provider.

mod glob;
pub mod pubsub;
pub mod store;
mod value;

pub use glob::glob_match;
pub use pubsub::MemoryPubSub;
pub use store::MemoryCacheProvider;
