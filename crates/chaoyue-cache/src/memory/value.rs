//! Stored entry representation for the in-memory provider.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use moka::Expiry;

use chaoyue_core::error::AppError;
use chaoyue_core::result::AppResult;
use chaoyue_core::types::ttl_millis;

/// A typed value, mirroring the Redis data types the provider supports.
#[derive(Debug, Clone)]
pub(crate) enum StoredValue {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    SortedSet(HashMap<Vec<u8>, f64>),
}

impl StoredValue {
    /// Collections disappear once their last element is removed.
    pub(crate) fn is_empty_collection(&self) -> bool {
        match self {
            Self::Bytes(_) => false,
            Self::Hash(h) => h.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::SortedSet(z) => z.is_empty(),
        }
    }
}

/// A value plus its absolute expiry deadline.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: StoredValue,
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    pub(crate) fn new(value: StoredValue, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    pub(crate) fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    pub(crate) fn into_bytes(entry: Option<Self>) -> AppResult<(Option<Vec<u8>>, Option<Instant>)> {
        match entry {
            None => Ok((None, None)),
            Some(Self {
                value: StoredValue::Bytes(b),
                expires_at,
            }) => Ok((Some(b), expires_at)),
            Some(_) => Err(AppError::wrong_type()),
        }
    }

    pub(crate) fn into_hash(
        entry: Option<Self>,
    ) -> AppResult<(HashMap<String, Vec<u8>>, Option<Instant>)> {
        match entry {
            None => Ok((HashMap::new(), None)),
            Some(Self {
                value: StoredValue::Hash(h),
                expires_at,
            }) => Ok((h, expires_at)),
            Some(_) => Err(AppError::wrong_type()),
        }
    }

    pub(crate) fn into_list(entry: Option<Self>) -> AppResult<(VecDeque<Vec<u8>>, Option<Instant>)> {
        match entry {
            None => Ok((VecDeque::new(), None)),
            Some(Self {
                value: StoredValue::List(l),
                expires_at,
            }) => Ok((l, expires_at)),
            Some(_) => Err(AppError::wrong_type()),
        }
    }

    pub(crate) fn into_sorted_set(
        entry: Option<Self>,
    ) -> AppResult<(HashMap<Vec<u8>, f64>, Option<Instant>)> {
        match entry {
            None => Ok((HashMap::new(), None)),
            Some(Self {
                value: StoredValue::SortedSet(z),
                expires_at,
            }) => Ok((z, expires_at)),
            Some(_) => Err(AppError::wrong_type()),
        }
    }
}

/// Absolute deadline for a TTL measured from now, rounded up to whole
/// milliseconds as Redis stores it.
///
/// A TTL too large to represent is treated as no expiry.
pub(crate) fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_millis(ttl_millis(ttl)))
}

/// Per-entry expiry policy: each entry lives until its own deadline.
pub(crate) struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, created_at: Instant) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(updated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_rounds_up_to_millisecond() {
        let before = Instant::now();
        let at = deadline(Duration::from_micros(10)).unwrap();
        assert!(at >= before + Duration::from_millis(1));
    }

    #[test]
    fn test_deadline_overflow_means_no_expiry() {
        assert!(deadline(Duration::MAX).is_none());
    }
}
