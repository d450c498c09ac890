//! HTTP method-based routing.
//!
//! This module provides [`MethodRouter`] which maps HTTP methods to values
//! (handlers, operation names, ...) for a single path.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to values for a single route.
///
/// A route rarely carries more than a handful of methods, so entries are kept
/// in a small inline vector and looked up linearly.
///
/// # Example
///
/// ```rust
/// use keel_router::MethodRouter;
/// use http::Method;
///
/// let router = MethodRouter::new()
///     .with(Method::GET, "listUsers")
///     .with(Method::POST, "createUser");
///
/// assert_eq!(router.get(&Method::GET), Some(&"listUsers"));
/// assert_eq!(router.get(&Method::DELETE), None);
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    entries: SmallVec<[(Method, T); 4]>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates a new empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert); an existing entry is kept.
    #[must_use]
    pub fn with(mut self, method: Method, value: T) -> Self {
        let _ = self.insert(method, value);
        self
    }

    /// Registers a value for `method`.
    ///
    /// Returns the rejected value if the method is already registered.
    pub fn insert(&mut self, method: Method, value: T) -> Result<(), T> {
        if self.contains(&method) {
            return Err(value);
        }
        self.entries.push((method, value));
        Ok(())
    }

    /// Returns the value registered for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }

    /// Returns true if `method` has a value.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// Merges another method router into this one.
    ///
    /// Methods already present here are NOT overwritten; the conflicting
    /// methods are returned.
    pub fn merge(&mut self, other: MethodRouter<T>) -> Vec<Method> {
        let mut conflicts = Vec::new();
        for (method, value) in other.entries {
            if self.contains(&method) {
                conflicts.push(method);
            } else {
                self.entries.push((method, value));
            }
        }
        conflicts
    }

    /// Returns true if any methods are registered.
    #[must_use]
    pub fn has_any_method(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Returns the registered methods in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }
}
