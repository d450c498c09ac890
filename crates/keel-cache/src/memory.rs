//! In-memory cache backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::cache::{Cache, Item};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Default)]
struct Inner {
    items: RwLock<HashMap<String, Item>>,
    sweeping: AtomicBool,
}

/// A process-local cache backed by a `HashMap` behind a reader-writer lock.
///
/// Reads share the lock, mutations take it exclusively. Expired items are
/// invisible to readers right away and physically removed by the sweeper
/// started with [`Cache::gc`].
///
/// Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Inner>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items, including expired ones the sweeper has not
    /// removed yet.
    #[must_use]
    pub fn stored_len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// Returns true once the sweeper has been started.
    #[must_use]
    pub fn is_sweeping(&self) -> bool {
        self.inner.sweeping.load(Ordering::SeqCst)
    }

    /// Removes every expired item now. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        Self::sweep_inner(&self.inner)
    }

    fn sweep_inner(inner: &Inner) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .items
            .read()
            .iter()
            .filter(|(_, item)| item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        if expired.is_empty() {
            return 0;
        }

        // A key may have been set again since the snapshot; only drop it if
        // it is still expired.
        let mut items = inner.items.write();
        let mut removed = 0;
        for key in &expired {
            if items.get(key).is_some_and(|item| item.is_expired_at(now)) {
                items.remove(key);
                removed += 1;
            }
        }
        removed
    }

    async fn run_sweeper(inner: Weak<Inner>, every: Duration) {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                debug!("cache dropped, sweeper exiting");
                return;
            };
            let removed = Self::sweep_inner(&inner);
            if removed > 0 {
                trace!(removed, "swept expired cache items");
            }
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<(Value, Duration)> {
        let items = self.inner.items.read();
        match items.get(key) {
            Some(item) if !item.is_expired() => Ok((item.value.clone(), item.ttl)),
            _ => Err(CacheError::KeyNotFound(key.to_string())),
        }
    }

    fn get_all(&self) -> HashMap<String, Item> {
        let now = Instant::now();
        self.inner
            .items
            .read()
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.inner
            .items
            .write()
            .insert(key.to_string(), Item::new(value, ttl));
    }

    fn exists(&self, key: &str) -> bool {
        self.inner
            .items
            .read()
            .get(key)
            .is_some_and(|item| !item.is_expired())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner
            .items
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    fn delete_all(&self) {
        self.inner.items.write().clear();
    }

    fn gc(&self, interval: Duration) -> CacheResult<()> {
        if interval.is_zero() {
            return Err(CacheError::InvalidInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        if self.inner.sweeping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!(?interval, "starting cache sweeper");
        runtime.spawn(Self::run_sweeper(Arc::downgrade(&self.inner), interval));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::ZERO);

        let (value, ttl) = cache.get("a").unwrap();
        assert_eq!(value, json!(1));
        assert_eq!(ttl, Duration::ZERO);
        assert!(cache.exists("a"));
    }

    #[test]
    fn test_set_replaces_value() {
        let cache = MemoryCache::new();
        cache.set("k", json!("v1"), Duration::from_secs(60));
        cache.set("k", json!("v2"), Duration::from_secs(60));
        assert_eq!(cache.get("k").unwrap().0, json!("v2"));
    }

    #[test]
    fn test_delete_missing_key() {
        let cache = MemoryCache::new();
        let err = cache.delete("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_all() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::ZERO);
        cache.set("b", json!(2), Duration::ZERO);
        cache.delete_all();

        assert!(!cache.exists("a"));
        assert!(!cache.exists("b"));
        assert!(cache.get_all().is_empty());
    }

    #[test]
    fn test_gc_outside_runtime() {
        let cache = MemoryCache::new();
        assert!(matches!(
            cache.gc(Duration::from_millis(10)),
            Err(CacheError::NoRuntime)
        ));
        assert!(!cache.is_sweeping());
    }

    #[tokio::test]
    async fn test_gc_rejects_zero_interval() {
        let cache = MemoryCache::new();
        assert!(matches!(
            cache.gc(Duration::ZERO),
            Err(CacheError::InvalidInterval)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_item_hidden_before_sweep() {
        let cache = MemoryCache::new();
        cache.set("short", json!(true), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!cache.exists("short"));
        assert!(cache.get("short").unwrap_err().is_not_found());
        assert_eq!(cache.stored_len(), 1);
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stored_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_starts_once() {
        let cache = MemoryCache::new();
        cache.gc(Duration::from_millis(50)).unwrap();
        cache.gc(Duration::from_millis(50)).unwrap();
        assert!(cache.is_sweeping());

        cache.set("x", json!(1), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.stored_len(), 0);
    }
}
