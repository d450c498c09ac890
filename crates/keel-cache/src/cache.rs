//! The cache capability surface.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::CacheResult;

/// A stored cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Stored value
    pub value: Value,
    /// Time to live; zero never expires
    pub ttl: Duration,
    /// When the value was last set
    pub created: Instant,
}

impl Item {
    /// Creates an item stamped with the current time.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            ttl,
            created: Instant::now(),
        }
    }

    /// An item expires once more than `ttl` has elapsed since it was set.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.created) > self.ttl
    }
}

/// A key/value cache backend.
///
/// Implementations are shared between requests and must be internally
/// synchronized.
pub trait Cache: Send + Sync + 'static {
    /// Returns the value and TTL stored under `key`.
    ///
    /// Fails with [`KeyNotFound`](crate::CacheError::KeyNotFound) if the key
    /// is absent or expired.
    fn get(&self, key: &str) -> CacheResult<(Value, Duration)>;

    /// Snapshot of every live item.
    fn get_all(&self) -> HashMap<String, Item>;

    /// Stores `value` under `key`, replacing value and timestamp.
    fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Returns true if `key` holds a live value.
    fn exists(&self, key: &str) -> bool;

    /// Removes `key`, failing with `KeyNotFound` if it is absent.
    fn delete(&self, key: &str) -> CacheResult<()>;

    /// Removes every item.
    fn delete_all(&self);

    /// Starts the background sweeper. Only the first call has any effect.
    fn gc(&self, interval: Duration) -> CacheResult<()>;
}

/// Typed accessors layered over the JSON-valued [`Cache`] surface.
///
/// # Example
///
/// ```rust
/// use keel_cache::{CacheExt, MemoryCache};
/// use std::time::Duration;
///
/// let cache = MemoryCache::new();
/// cache.set_as("answer", &42u32, Duration::ZERO).unwrap();
/// let answer: u32 = cache.get_as("answer").unwrap();
/// assert_eq!(answer, 42);
/// ```
pub trait CacheExt: Cache {
    /// Deserializes the value under `key`.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        let (value, _) = self.get(key)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Serializes `value` and stores it under `key`.
    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        self.set(key, serde_json::to_value(value)?, ttl);
        Ok(())
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
