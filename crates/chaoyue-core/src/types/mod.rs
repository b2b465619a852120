//! Value types exchanged between the facade and cache providers.

pub mod message;
pub mod range;
pub mod ttl;

pub use message::ChannelMessage;
pub use range::{Limit, ScoreRange};
pub use ttl::{KeyTtl, normalize_ttl, ttl_millis};
