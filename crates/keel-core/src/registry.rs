//! Named backend registries.
//!
//! Each backend family (caches, router backends, config readers, SQL drivers)
//! owns one [`Registry`]. Backends register a factory under a name at startup
//! and consumers look them up by that name.
//!
//! # Example
//!
//! ```rust
//! use keel_core::registry::{Registry, RegistryError};
//!
//! let registry: Registry<String> = Registry::new("greeter");
//! registry.register("hello", || "hello".to_string()).unwrap();
//!
//! assert_eq!(registry.get("hello").unwrap(), "hello");
//! assert!(matches!(
//!     registry.register("hello", || String::new()),
//!     Err(RegistryError::DuplicateBackend { .. })
//! ));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors raised by a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The backend name was empty.
    #[error("{family}: backend name must not be empty")]
    EmptyBackend {
        /// Backend family of the registry
        family: &'static str,
    },

    /// A backend is already registered under this name.
    #[error("{family}: backend '{name}' is already registered")]
    DuplicateBackend {
        /// Backend family of the registry
        family: &'static str,
        /// Rejected name
        name: String,
    },

    /// No backend is registered under this name.
    #[error("{family}: unknown backend '{name}'")]
    UnknownBackend {
        /// Backend family of the registry
        family: &'static str,
        /// Requested name
        name: String,
    },
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A name to factory mapping for one backend family.
///
/// Registration happens during startup; lookups afterwards only take the
/// read side of the lock. Re-registering a name is rejected, there is no
/// unregistration.
pub struct Registry<T> {
    family: &'static str,
    factories: RwLock<HashMap<String, Factory<T>>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry for `family`.
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// The family name used in error messages.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Registers `factory` under `name`.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyBackend {
                family: self.family,
            });
        }

        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(RegistryError::DuplicateBackend {
                family: self.family,
                name,
            });
        }

        tracing::debug!(family = self.family, backend = %name, "backend registered");
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builds the backend registered under `name`.
    pub fn get(&self, name: &str) -> Result<T, RegistryError> {
        // Clone the factory out so it runs without holding the lock.
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBackend {
                family: self.family,
                name: name.to_string(),
            })?;
        Ok(factory())
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("backends", &self.names())
            .finish()
    }
}
