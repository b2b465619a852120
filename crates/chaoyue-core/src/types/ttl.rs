//! Key expiry types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remaining lifetime of a key, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining_ms", rename_all = "snake_case")]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after the given duration.
    Expires(#[serde(with = "duration_ms")] Duration),
}

impl KeyTtl {
    /// Interpret a Redis `PTTL` reply (`-2` missing, `-1` persistent).
    pub fn from_millis_reply(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            r if r < 0 => Self::Persistent,
            r => Self::Expires(Duration::from_millis(r as u64)),
        }
    }

    /// The remaining duration, if the key has an expiry.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the key exists.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Collapse "no expiry" spellings to `None`.
///
/// A zero duration means the value is stored without expiry.
pub fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|d| !d.is_zero())
}

/// Milliseconds for a PX/PEXPIRE argument, never below 1.
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(super::ttl_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
