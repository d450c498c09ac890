//! Process-wide cache backend registry.
//!
//! Each backend name resolves to a single shared instance: every lookup of
//! `"memory"` returns a handle to the same storage.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use keel_core::Registry;

use crate::cache::Cache;
use crate::error::CacheResult;
use crate::memory::MemoryCache;

/// Name of the built-in in-memory backend.
pub const MEMORY: &str = "memory";

type SharedCache = Arc<dyn Cache>;

fn registry() -> &'static Registry<SharedCache> {
    static REGISTRY: OnceLock<Registry<SharedCache>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::new("cache");
        // Fresh registry, the name cannot collide.
        let _ = registry.register(MEMORY, || Arc::new(MemoryCache::new()) as SharedCache);
        registry
    })
}

fn instances() -> &'static DashMap<String, SharedCache> {
    static INSTANCES: OnceLock<DashMap<String, SharedCache>> = OnceLock::new();
    INSTANCES.get_or_init(DashMap::new)
}

/// Registers a cache backend factory under `name`.
///
/// The factory runs at most once; its product is shared by every later
/// lookup of `name`.
pub fn register<F>(name: impl Into<String>, factory: F) -> CacheResult<()>
where
    F: Fn() -> SharedCache + Send + Sync + 'static,
{
    registry().register(name, factory)?;
    Ok(())
}

/// Returns the shared instance of backend `name`.
pub fn get(name: &str) -> CacheResult<SharedCache> {
    if let Some(existing) = instances().get(name) {
        return Ok(Arc::clone(existing.value()));
    }
    let created = registry().get(name)?;
    let entry = instances()
        .entry(name.to_string())
        .or_insert(created)
        .value()
        .clone();
    Ok(entry)
}

/// Returns the shared instance of backend `name` with its sweeper running.
///
/// Sweeper start-up failures are returned instead of a handle.
pub fn open(name: &str, cycle: Duration) -> CacheResult<SharedCache> {
    let cache = get(name)?;
    cache.gc(cycle)?;
    tracing::info!(backend = name, ?cycle, "cache ready");
    Ok(cache)
}

/// Names of every registered backend.
pub fn backends() -> Vec<String> {
    registry().names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheError;
    use serde_json::json;

    #[test]
    fn test_memory_is_builtin() {
        assert!(backends().contains(&MEMORY.to_string()));
    }

    #[test]
    fn test_same_name_shares_storage() {
        let a = get(MEMORY).unwrap();
        let b = get(MEMORY).unwrap();
        a.set("registry-shared", json!("yes"), Duration::ZERO);
        assert_eq!(b.get("registry-shared").unwrap().0, json!("yes"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_backend() {
        let err = get("redis-that-does-not-exist").err().unwrap();
        assert!(matches!(err, CacheError::Registry(_)));
    }

    #[test]
    fn test_duplicate_registration() {
        let err = register(MEMORY, || Arc::new(MemoryCache::new()) as SharedCache).unwrap_err();
        assert!(matches!(err, CacheError::Registry(_)));
    }

    #[test]
    fn test_open_without_runtime_surfaces_error() {
        register("registry-test-no-runtime", || {
            Arc::new(MemoryCache::new()) as SharedCache
        })
        .unwrap();
        let err = open("registry-test-no-runtime", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, CacheError::NoRuntime));
    }
}
