//! Route table built on the radix tree.

use http::Method;

use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::{InsertError, RouteMatch};

/// Path router mapping (pattern, method) pairs to values.
///
/// # Example
///
/// ```rust
/// use keel_router::{MethodRouter, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router
///     .insert("/users/{id}", MethodRouter::new().with(Method::GET, "getUser"))
///     .unwrap();
///
/// let m = router.match_route(&Method::GET, "/users/7").unwrap();
/// assert_eq!(*m.value, "getUser");
/// assert_eq!(m.params.get("id"), Some("7"));
/// ```
///
/// # Route Priority
///
/// For a given segment, static children are tried before the parameter
/// child, which is tried before a catch-all.
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Inserts every method in `methods` under `path`.
    ///
    /// Methods already present at `path` are left untouched and reported
    /// as [`InsertError::Conflict`]; the non-conflicting ones are still added.
    pub fn insert(&mut self, path: &str, methods: MethodRouter<T>) -> Result<(), InsertError> {
        self.root.insert(path, methods)?;
        self.route_count += 1;
        Ok(())
    }

    /// Adds a single-method route.
    pub fn route(&mut self, method: Method, path: &str, value: T) -> Result<(), InsertError> {
        self.insert(path, MethodRouter::new().with(method, value))
    }

    /// Resolves a request method and path.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let (methods, params) = self.root.match_path(path)?;
        let value = methods.get(method)?;
        Some(RouteMatch { value, params })
    }

    /// Resolves a path regardless of method.
    ///
    /// Used to tell "no such path" apart from "method not allowed".
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.root.match_path(path)
    }

    /// Number of successful inserts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_match_static() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "listUsers").unwrap();

        let m = router.match_route(&Method::GET, "/users").unwrap();
        assert_eq!(*m.value, "listUsers");
        assert!(m.params.is_empty());
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_router_colon_and_brace_params_are_equivalent() {
        let mut router = Router::new();
        router.route(Method::GET, "/users/:id", "colon").unwrap();

        let m = router.match_route(&Method::GET, "/users/9").unwrap();
        assert_eq!(m.params.get("id"), Some("9"));

        // Same parameter name in brace form extends the same node.
        router.route(Method::POST, "/users/{id}", "brace").unwrap();
        let m = router.match_route(&Method::POST, "/users/9").unwrap();
        assert_eq!(*m.value, "brace");
    }

    #[test]
    fn test_router_method_not_allowed() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "listUsers").unwrap();

        assert!(router.match_route(&Method::POST, "/users").is_none());
        let (methods, _) = router.match_path("/users").unwrap();
        assert_eq!(methods.allowed_methods(), vec![Method::GET]);
    }

    #[test]
    fn test_router_methods_accumulate_per_path() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "list").unwrap();
        router.route(Method::POST, "/users", "create").unwrap();

        assert_eq!(*router.match_route(&Method::GET, "/users").unwrap().value, "list");
        assert_eq!(*router.match_route(&Method::POST, "/users").unwrap().value, "create");
    }

    #[test]
    fn test_router_duplicate_rejected() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "a").unwrap();
        let err = router.route(Method::GET, "/users", "b").unwrap_err();

        assert_eq!(err, InsertError::Conflict(vec![Method::GET]));
        assert_eq!(*router.match_route(&Method::GET, "/users").unwrap().value, "a");
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_router_complex_paths() {
        let mut router = Router::new();
        router.route(Method::GET, "/api/v1/users/{userId}", "getUser").unwrap();
        router
            .route(Method::GET, "/api/v1/users/{userId}/posts/{postId}", "getUserPost")
            .unwrap();

        let m = router
            .match_route(&Method::GET, "/api/v1/users/123/posts/456")
            .unwrap();
        assert_eq!(*m.value, "getUserPost");
        assert_eq!(m.params.get("userId"), Some("123"));
        assert_eq!(m.params.get("postId"), Some("456"));
    }

    #[test]
    fn test_router_trailing_slash_normalized() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "listUsers").unwrap();
        assert!(router.match_route(&Method::GET, "/users/").is_some());
    }

    #[test]
    fn test_router_root_path() {
        let mut router = Router::new();
        router.route(Method::GET, "/", "root").unwrap();
        assert_eq!(*router.match_route(&Method::GET, "/").unwrap().value, "root");
    }
}
