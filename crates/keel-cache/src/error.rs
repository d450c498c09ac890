//! Cache errors.

use keel_core::RegistryError;
use thiserror::Error;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache backends and the cache registry.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent or its TTL has elapsed.
    #[error("cache key '{0}' not found")]
    KeyNotFound(String),

    /// The sweeper needs a Tokio runtime and none is running.
    #[error("cache sweeper requires a running tokio runtime")]
    NoRuntime,

    /// The sweep interval was zero.
    #[error("cache sweep interval must be greater than zero")]
    InvalidInterval,

    /// A typed value could not be converted to or from JSON.
    #[error("cache value conversion failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl CacheError {
    /// Returns true for [`CacheError::KeyNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }
}
