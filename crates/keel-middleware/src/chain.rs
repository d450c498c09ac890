//! Ordered middleware chains.
//!
//! A middleware is a function from handler to handler. A chain applies its
//! middleware right to left so the first one appended ends up outermost and
//! sees the request first.
//!
//! # Example
//!
//! ```rust
//! use keel_middleware::{middleware_fn, Chain};
//! use keel_core::{handler_fn, text_response, Handler};
//! use http::StatusCode;
//!
//! let tag = middleware_fn(|next: Handler| {
//!     keel_core::handler_fn(move |req| {
//!         let next = next.clone();
//!         async move {
//!             let mut res = next(req).await;
//!             res.headers_mut().insert("x-tag", "on".parse().unwrap());
//!             res
//!         }
//!     })
//! });
//!
//! let chain = Chain::new([tag]);
//! let handler = chain.handle(handler_fn(|_req| async { text_response(StatusCode::OK, "hi") }));
//! # let _ = handler;
//! ```

use std::fmt;
use std::sync::Arc;

use keel_core::{Handler, ParamHandler, Params, Request};

/// Wraps a [`Handler`] in another [`Handler`].
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wraps a [`ParamHandler`] in another [`ParamHandler`].
pub type ParamMiddleware = Arc<dyn Fn(ParamHandler) -> ParamHandler + Send + Sync>;

/// Boxes a closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Boxes a closure as a [`ParamMiddleware`].
pub fn param_middleware_fn<F>(f: F) -> ParamMiddleware
where
    F: Fn(ParamHandler) -> ParamHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An ordered list of [`Middleware`] for plain handlers.
#[derive(Clone, Default)]
pub struct Chain {
    middleware: Vec<Middleware>,
}

impl Chain {
    /// Creates a chain from middleware in outermost-first order.
    pub fn new(middleware: impl IntoIterator<Item = Middleware>) -> Self {
        Self {
            middleware: middleware.into_iter().collect(),
        }
    }

    /// Returns a new chain with `more` appended after the existing middleware.
    pub fn append(&self, more: impl IntoIterator<Item = Middleware>) -> Self {
        let mut middleware = self.middleware.clone();
        middleware.extend(more);
        Self { middleware }
    }

    /// Wraps `handler` in every middleware of the chain.
    pub fn handle(&self, handler: Handler) -> Handler {
        self.middleware
            .iter()
            .rev()
            .fold(handler, |inner, wrap| wrap(inner))
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns true if the chain has no middleware.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

/// An ordered list of [`ParamMiddleware`] for parameter-receiving handlers.
///
/// Composition is the same as [`Chain`].
#[derive(Clone, Default)]
pub struct ParamChain {
    middleware: Vec<ParamMiddleware>,
}

impl ParamChain {
    /// Creates a chain from middleware in outermost-first order.
    pub fn new(middleware: impl IntoIterator<Item = ParamMiddleware>) -> Self {
        Self {
            middleware: middleware.into_iter().collect(),
        }
    }

    /// Returns a new chain with `more` appended after the existing middleware.
    pub fn append(&self, more: impl IntoIterator<Item = ParamMiddleware>) -> Self {
        let mut middleware = self.middleware.clone();
        middleware.extend(more);
        Self { middleware }
    }

    /// Returns a new chain with `outer` placed in front of the existing middleware.
    pub fn prepend(&self, outer: ParamMiddleware) -> Self {
        let mut middleware = Vec::with_capacity(self.middleware.len() + 1);
        middleware.push(outer);
        middleware.extend(self.middleware.iter().cloned());
        Self { middleware }
    }

    /// Wraps `handler` in every middleware of the chain.
    pub fn handle(&self, handler: ParamHandler) -> ParamHandler {
        self.middleware
            .iter()
            .rev()
            .fold(handler, |inner, wrap| wrap(inner))
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns true if the chain has no middleware.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl fmt::Debug for ParamChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamChain").field("len", &self.len()).finish()
    }
}

/// Lifts a plain [`Middleware`] so it can sit in a [`ParamChain`].
///
/// Path parameters ride through the wrapped middleware in the request
/// extensions and reach the inner handler unchanged.
pub fn lift(middleware: Middleware) -> ParamMiddleware {
    param_middleware_fn(move |next: ParamHandler| -> ParamHandler {
        let bridged: Handler = Arc::new(move |mut req: Request| {
            let params = req.extensions_mut().remove::<Params>().unwrap_or_default();
            next(req, params)
        });
        let wrapped = middleware(bridged);
        Arc::new(move |mut req: Request, params: Params| {
            req.extensions_mut().insert(params);
            wrapped(req)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use keel_core::{empty_response, handler_fn, param_handler_fn, request};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &'static str, log: &Log) -> Middleware {
        let log = Arc::clone(log);
        middleware_fn(move |next: Handler| {
            let log = Arc::clone(&log);
            handler_fn(move |req| {
                let next = Arc::clone(&next);
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(format!("{name}-pre"));
                    let res = next(req).await;
                    log.lock().push(format!("{name}-post"));
                    res
                }
            })
        })
    }

    #[tokio::test]
    async fn test_first_appended_is_outermost() {
        let log: Log = Arc::default();
        let chain = Chain::new([recording("A", &log)]).append([recording("B", &log)]);

        let inner_log = Arc::clone(&log);
        let handler = chain.handle(handler_fn(move |_req| {
            let log = Arc::clone(&inner_log);
            async move {
                log.lock().push("H".to_string());
                empty_response(StatusCode::OK)
            }
        }));

        handler(request(http::Method::GET, "/", bytes::Bytes::new())).await;
        assert_eq!(
            *log.lock(),
            vec!["A-pre", "B-pre", "H", "B-post", "A-post"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let chain = Chain::default();
        assert!(chain.is_empty());

        let handler = chain.handle(handler_fn(|_req| async { empty_response(StatusCode::ACCEPTED) }));
        let res = handler(request(http::Method::GET, "/", bytes::Bytes::new())).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_append_does_not_mutate_original() {
        let log: Log = Arc::default();
        let base = Chain::new([recording("A", &log)]);
        let extended = base.append([recording("B", &log)]);
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[tokio::test]
    async fn test_param_chain_with_lifted_middleware() {
        let log: Log = Arc::default();
        let chain = ParamChain::new([lift(recording("A", &log))]).prepend(lift(recording("G", &log)));

        let handler = chain.handle(param_handler_fn(|_req, params: Params| async move {
            let status = if params.get("id") == Some("7") {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            empty_response(status)
        }));

        let mut params = Params::new();
        params.push("id", "7");
        let res = handler(request(http::Method::GET, "/items/7", bytes::Bytes::new()), params).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*log.lock(), vec!["G-pre", "A-pre", "A-post", "G-post"]);
    }
}
