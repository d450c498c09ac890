//! The router facade.
//!
//! A [`RouterManager`] collects the favicon, static directories, controller
//! routes and the not-found handler, then materializes them on a backend in
//! that order.
//!
//! # Example
//!
//! ```rust
//! use keel_controller::{Controller, Descriptor, Invocation, RouteConfig};
//! use keel_server::RouterManager;
//!
//! #[derive(Clone, Default)]
//! struct Home;
//! impl Controller for Home {}
//!
//! let home = Descriptor::new(Home)
//!     .sync_operation("Get", |inv: &mut Invocation<Home>| inv.set("page", "home"));
//!
//! let mut router = RouterManager::get("radix").unwrap();
//! router.public_route("/", &home, RouteConfig::new("get:Get")).unwrap();
//! let handler = router.handler().unwrap();
//! # let _ = handler;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use http::Method;
use keel_controller::{Dispatch, RouteConfig};
use keel_core::{ignore_params, Handler, ParamHandler, RegistryError};
use keel_middleware::{ParamChain, ParamMiddleware};
use tracing::{debug, info};

use crate::backend::{self, RouterBackend};
use crate::error::RouterError;
use crate::static_files::{favicon_handler, StaticFiles, FILE_PARAM};

/// URL the favicon is served under.
pub const FAVICON_PATH: &str = "/favicon.ico";

struct Route {
    pattern: String,
    methods: Vec<Method>,
    handler: ParamHandler,
    middleware: ParamChain,
    protected: bool,
}

/// Route registrations awaiting a backend.
pub struct RouterManager {
    provider: String,
    favicon: Option<PathBuf>,
    directories: Vec<(String, PathBuf)>,
    routes: Vec<Route>,
    not_found: Option<Handler>,
    guard: Option<ParamMiddleware>,
}

impl RouterManager {
    /// A manager for the backend registered as `name`.
    pub fn get(name: &str) -> Result<Self, RouterError> {
        if !backend::has_backend(name) {
            return Err(RegistryError::UnknownBackend {
                family: backend::FAMILY,
                name: name.to_string(),
            }
            .into());
        }
        Ok(Self {
            provider: name.to_string(),
            favicon: None,
            directories: Vec::new(),
            routes: Vec::new(),
            not_found: None,
            guard: None,
        })
    }

    /// Backend name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Registers a route open to every client.
    ///
    /// The controller is initialized with the route's bindings immediately.
    pub fn public_route<D>(
        &mut self,
        pattern: &str,
        controller: &D,
        config: RouteConfig,
    ) -> Result<&mut Self, RouterError>
    where
        D: Dispatch,
    {
        self.add_route(pattern, controller, config, false)
    }

    /// Registers a route behind the guard set with [`protect_with`](Self::protect_with).
    pub fn protected_route<D>(
        &mut self,
        pattern: &str,
        controller: &D,
        config: RouteConfig,
    ) -> Result<&mut Self, RouterError>
    where
        D: Dispatch,
    {
        self.add_route(pattern, controller, config, true)
    }

    /// Middleware prepended to every protected route.
    pub fn protect_with(&mut self, guard: ParamMiddleware) -> &mut Self {
        self.guard = Some(guard);
        self
    }

    /// Serves the file at `path` under `/favicon.ico`.
    pub fn favicon(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.favicon = Some(path.into());
        self
    }

    /// Serves files below `source` under the `url` prefix.
    pub fn public_dir(&mut self, url: &str, source: impl Into<PathBuf>) -> &mut Self {
        let prefix = url.trim_end_matches('/').to_string();
        self.directories.push((prefix, source.into()));
        self
    }

    /// Handler for paths that match no route.
    pub fn not_found(&mut self, handler: Handler) -> &mut Self {
        self.not_found = Some(handler);
        self
    }

    /// Number of controller routes registered.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Builds a handler on a fresh backend instance.
    ///
    /// Registration order is favicon, static directories, controller routes,
    /// not-found.
    pub fn handler(&self) -> Result<Handler, RouterError> {
        let mut backend = backend::backend(&self.provider)?;

        if let Some(path) = &self.favicon {
            let favicon = ignore_params(favicon_handler(path.clone()));
            for method in [Method::GET, Method::HEAD] {
                backend.add(method, FAVICON_PATH, Arc::clone(&favicon))?;
            }
        }

        for (prefix, source) in &self.directories {
            let pattern = format!("{prefix}/*{FILE_PARAM}");
            let files = StaticFiles::new(source).into_handler();
            for method in [Method::GET, Method::HEAD] {
                backend.add(method, &pattern, Arc::clone(&files))?;
            }
        }

        for route in &self.routes {
            self.add_to_backend(backend.as_mut(), route)?;
        }

        if let Some(handler) = &self.not_found {
            backend.set_not_found(Arc::clone(handler));
        }

        info!(
            provider = %self.provider,
            routes = self.routes.len(),
            directories = self.directories.len(),
            favicon = self.favicon.is_some(),
            "router materialized"
        );
        Ok(backend.build())
    }

    fn add_route<D: Dispatch>(
        &mut self,
        pattern: &str,
        controller: &D,
        config: RouteConfig,
        protected: bool,
    ) -> Result<&mut Self, RouterError> {
        let bindings = config.bindings()?;
        controller.initialize(pattern, &bindings, config.allow_http_method_override)?;
        debug!(
            controller = controller.name(),
            %pattern,
            protected,
            mapping = %config.http_method_to_func,
            "route registered"
        );

        self.routes.push(Route {
            pattern: pattern.to_string(),
            methods: bindings.into_iter().map(|(method, _)| method).collect(),
            handler: controller.handler(pattern),
            middleware: config.middleware.unwrap_or_default(),
            protected,
        });
        Ok(self)
    }

    fn add_to_backend(
        &self,
        backend: &mut dyn RouterBackend,
        route: &Route,
    ) -> Result<(), RouterError> {
        let chain = match (&self.guard, route.protected) {
            (Some(guard), true) => route.middleware.prepend(Arc::clone(guard)),
            _ => route.middleware.clone(),
        };
        let handler = chain.handle(Arc::clone(&route.handler));
        for method in &route.methods {
            backend.add(method.clone(), &route.pattern, Arc::clone(&handler))?;
        }
        Ok(())
    }
}

impl fmt::Debug for RouterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterManager")
            .field("provider", &self.provider)
            .field("favicon", &self.favicon)
            .field("directories", &self.directories)
            .field(
                "routes",
                &self.routes.iter().map(|r| r.pattern.as_str()).collect::<Vec<_>>(),
            )
            .field("not_found", &self.not_found.is_some())
            .field("guard", &self.guard.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use keel_controller::{body_bytes, Controller, ControllerError, Descriptor, Invocation};
    use keel_core::{empty_response, param_handler_fn, request};
    use keel_middleware::param_middleware_fn;

    #[derive(Clone, Default)]
    struct Users;

    impl Controller for Users {}

    fn users() -> Descriptor<Users> {
        Descriptor::new(Users)
            .sync_operation("List", |inv: &mut Invocation<Users>| inv.set("users", "all"))
            .sync_operation("Show", |inv: &mut Invocation<Users>| {
                let id = inv.param("id").unwrap_or_default().to_string();
                inv.set("id", id);
            })
    }

    fn deny() -> ParamMiddleware {
        param_middleware_fn(|_next: ParamHandler| -> ParamHandler {
            param_handler_fn(|_req, _params| async { empty_response(StatusCode::UNAUTHORIZED) })
        })
    }

    #[test]
    fn test_unknown_provider() {
        let err = RouterManager::get("missing-backend").unwrap_err();
        assert!(matches!(err, RouterError::Registry(_)));
    }

    #[test]
    fn test_unknown_operation_fails_registration() {
        let mut router = RouterManager::get("radix").unwrap();
        let err = router
            .public_route("/users", &users(), RouteConfig::new("get:Missing"))
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::Controller(ControllerError::UnknownOperation { .. })
        ));
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_bad_mapping_fails_registration() {
        let mut router = RouterManager::get("radix").unwrap();
        let err = router
            .public_route("/users", &users(), RouteConfig::new("fetch:List"))
            .unwrap_err();
        assert!(matches!(err, RouterError::Controller(_)));
    }

    #[tokio::test]
    async fn test_routes_dispatch_per_method() {
        let users = users();
        let mut router = RouterManager::get("radix").unwrap();
        router
            .public_route("/users", &users, RouteConfig::new("get:List"))
            .unwrap()
            .public_route("/users/{id}", &users, RouteConfig::new("get:Show"))
            .unwrap();
        let handler = router.handler().unwrap();

        let res = handler(request(Method::GET, "/users/7", Bytes::new())).await;
        assert_eq!(&body_bytes(res).await[..], br#"{"id":"7"}"#);

        let res = handler(request(Method::POST, "/users", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_protected_route_uses_guard() {
        let users = users();
        let mut router = RouterManager::get("radix").unwrap();
        router
            .protect_with(deny())
            .protected_route("/admin", &users, RouteConfig::new("get:List").allow_override())
            .unwrap()
            .public_route("/users", &users, RouteConfig::new("get:List").allow_override())
            .unwrap();
        let handler = router.handler().unwrap();

        let res = handler(request(Method::GET, "/admin", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = handler(request(Method::GET, "/users", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_without_guard_is_public() {
        let mut router = RouterManager::get("radix").unwrap();
        router
            .protected_route("/users", &users(), RouteConfig::new("get:List"))
            .unwrap();
        let handler = router.handler().unwrap();

        let res = handler(request(Method::GET, "/users", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn test_duplicate_route_surfaces_on_materialize() {
        let mut router = RouterManager::get("radix").unwrap();
        let first = users();
        let second = users();
        router
            .public_route("/users", &first, RouteConfig::new("get:List"))
            .unwrap()
            .public_route("/users", &second, RouteConfig::new("get:List"))
            .unwrap();

        let err = router.handler().err().unwrap();
        assert!(matches!(err, RouterError::DuplicateRoute { .. }));
    }
}
