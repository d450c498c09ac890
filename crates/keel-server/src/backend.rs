//! Router backends.
//!
//! A backend turns `(method, pattern, handler)` registrations into a single
//! [`Handler`]. Backends are looked up by name in a process-wide registry;
//! the built-in `radix` backend matches paths with [`keel_router::Router`].

use std::sync::{Arc, OnceLock};

use http::{header, HeaderValue, Method, StatusCode};
use keel_core::{
    handler_fn, not_found_handler, text_response, Handler, ParamHandler, Registry, Request,
};
use keel_router::{InsertError, Router};
use tracing::debug;

use crate::error::RouterError;

/// Name of the built-in radix-tree backend.
pub const RADIX: &str = "radix";

/// Registry family of router backends.
pub const FAMILY: &str = "router";

/// Collects routes and produces the handler serving them.
pub trait RouterBackend: Send {
    /// Registers `handler` for `method` requests matching `pattern`.
    fn add(&mut self, method: Method, pattern: &str, handler: ParamHandler)
        -> Result<(), RouterError>;

    /// Handler for paths that match no route.
    fn set_not_found(&mut self, handler: Handler);

    /// Freezes the routes into a handler.
    fn build(self: Box<Self>) -> Handler;
}

/// Backend built on the radix-tree matcher.
///
/// Paths that match a pattern but not the request method get
/// `405 Method Not Allowed` with an `Allow` header.
#[derive(Default)]
pub struct RadixBackend {
    router: Router<ParamHandler>,
    not_found: Option<Handler>,
}

impl RadixBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RouterBackend for RadixBackend {
    fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handler: ParamHandler,
    ) -> Result<(), RouterError> {
        self.router
            .route(method.clone(), pattern, handler)
            .map_err(|err| match err {
                InsertError::Conflict(_) => RouterError::DuplicateRoute {
                    method: method.clone(),
                    pattern: pattern.to_string(),
                },
                other => RouterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: other.to_string(),
                },
            })?;
        debug!(%method, %pattern, "route added");
        Ok(())
    }

    fn set_not_found(&mut self, handler: Handler) {
        self.not_found = Some(handler);
    }

    fn build(self: Box<Self>) -> Handler {
        let Self { router, not_found } = *self;
        let router = Arc::new(router);
        let not_found = not_found.unwrap_or_else(not_found_handler);

        handler_fn(move |req: Request| {
            let router = Arc::clone(&router);
            let not_found = Arc::clone(&not_found);
            async move {
                let Some((methods, params)) = router.match_path(req.uri().path()) else {
                    return not_found(req).await;
                };
                if let Some(handler) = methods.get(req.method()) {
                    let handler = Arc::clone(handler);
                    return handler(req, params).await;
                }

                let allowed_methods = methods.allowed_methods();
                let allowed: Vec<&str> = allowed_methods.iter().map(Method::as_str).collect();
                let mut response =
                    text_response(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n");
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
        })
    }
}

type BackendFactory = Box<dyn RouterBackend>;

fn registry() -> &'static Registry<BackendFactory> {
    static REGISTRY: OnceLock<Registry<BackendFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::new(FAMILY);
        let _ = registry.register(RADIX, || Box::new(RadixBackend::new()) as BackendFactory);
        registry
    })
}

/// Registers a router backend under `name`.
pub fn register_backend<F>(name: impl Into<String>, factory: F) -> Result<(), RouterError>
where
    F: Fn() -> Box<dyn RouterBackend> + Send + Sync + 'static,
{
    registry().register(name, factory)?;
    Ok(())
}

/// A fresh instance of the backend registered as `name`.
pub fn backend(name: &str) -> Result<Box<dyn RouterBackend>, RouterError> {
    Ok(registry().get(name)?)
}

/// Returns true if a backend is registered as `name`.
pub fn has_backend(name: &str) -> bool {
    registry().contains(name)
}

/// Names of all registered backends, sorted.
pub fn backends() -> Vec<String> {
    registry().names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use keel_core::{empty_response, param_handler_fn, request, Params};

    fn ok() -> ParamHandler {
        param_handler_fn(|_req, params: Params| async move {
            text_response(StatusCode::OK, params.get("id").unwrap_or("-").to_string())
        })
    }

    #[test]
    fn test_radix_is_registered() {
        assert!(has_backend(RADIX));
        assert!(backends().contains(&RADIX.to_string()));
        assert!(matches!(
            backend("nope"),
            Err(RouterError::Registry(_))
        ));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut backend = RadixBackend::new();
        backend.add(Method::GET, "/users/{id}", ok()).unwrap();
        backend.add(Method::POST, "/users/{id}", ok()).unwrap();

        let err = backend.add(Method::GET, "/users/{id}", ok()).unwrap_err();
        assert_eq!(
            err,
            RouterError::DuplicateRoute {
                method: Method::GET,
                pattern: "/users/{id}".into()
            }
        );
    }

    #[test]
    fn test_catch_all_must_be_last() {
        let mut backend = RadixBackend::new();
        let err = backend.add(Method::GET, "/files/*rest/more", ok()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_dispatches_with_params() {
        let mut backend = RadixBackend::new();
        backend.add(Method::GET, "/users/{id}", ok()).unwrap();
        let handler = Box::new(backend).build();

        let res = handler(request(Method::GET, "/users/42", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = keel_controller::body_bytes(res).await;
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let mut backend = RadixBackend::new();
        backend.add(Method::GET, "/users", ok()).unwrap();
        backend.add(Method::POST, "/users", ok()).unwrap();
        let handler = Box::new(backend).build();

        let res = handler(request(Method::DELETE, "/users", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[header::ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn test_unmatched_goes_to_not_found() {
        let mut backend = RadixBackend::new();
        backend.set_not_found(handler_fn(|_req| async {
            empty_response(StatusCode::IM_A_TEAPOT)
        }));
        let handler = Box::new(backend).build();

        let res = handler(request(Method::GET, "/nothing", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_default_not_found() {
        let handler = Box::new(RadixBackend::new()).build();
        let res = handler(request(Method::GET, "/nothing", Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
