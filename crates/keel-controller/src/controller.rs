//! Controller descriptors and per-request dispatch.
//!
//! A [`Descriptor`] holds a prototype controller value, the operations it
//! exposes by name and the `(pattern, method) -> operation` table built as
//! routes are registered. Every request gets its own [`Invocation`]: a fresh
//! clone of the prototype plus a new [`Context`], so concurrent requests never
//! share mutable controller state.
//!
//! # Example
//!
//! ```rust
//! use keel_controller::{Controller, Descriptor, Dispatch, Invocation};
//! use http::Method;
//!
//! #[derive(Clone, Default)]
//! struct Hello;
//!
//! impl Controller for Hello {}
//!
//! let hello = Descriptor::new(Hello)
//!     .sync_operation("Get", |inv: &mut Invocation<Hello>| inv.set("hello", "world"))
//!     .operation("Slow", |inv| {
//!         Box::pin(async move {
//!             inv.set("slow", true);
//!         })
//!     });
//!
//! hello.initialize("/", &[(Method::GET, "Get".to_string())], false).unwrap();
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use keel_cache::Cache;
use keel_core::{
    empty_response, param_handler_fn, BoxFuture, CancelSignal, ParamHandler, Params, Request,
    RequestId, Response,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::{Context, RequestContext, ResponseContext};
use crate::error::ControllerError;
use crate::render::{JsonRenderer, Renderer, JSON};

/// Non-standard status written when the client disconnects before the
/// response is rendered.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT)
}

/// User controller state.
///
/// The value registered with a [`Descriptor`] is the prototype; each request
/// works on its own clone.
pub trait Controller: Clone + Send + Sync + 'static {
    /// Render type the controller declares for itself. `None` selects
    /// `"json"`.
    fn render_type(&self) -> Option<&str> {
        None
    }
}

/// A named controller operation.
pub type Operation<C> =
    Arc<dyn for<'a> Fn(&'a mut Invocation<C>) -> BoxFuture<'a, ()> + Send + Sync>;

fn boxed_operation<C, F>(f: F) -> Operation<C>
where
    C: Controller,
    F: for<'a> Fn(&'a mut Invocation<C>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One request's controller clone and context.
pub struct Invocation<C> {
    controller: C,
    /// Request and response.
    pub ctx: Context,
    render_type: Arc<str>,
    cache: Option<Arc<dyn Cache>>,
}

impl<C: Controller> Invocation<C> {
    /// The controller clone for this request.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Mutable access to the controller clone.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// The inbound request.
    pub fn request(&self) -> &RequestContext {
        &self.ctx.request
    }

    /// The response being built.
    pub fn response(&mut self) -> &mut ResponseContext {
        &mut self.ctx.response
    }

    /// Path parameter captured by the router.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.ctx.request.param(name)
    }

    /// Render type used for this request.
    pub fn render_type(&self) -> &str {
        &self.render_type
    }

    /// Records a value for the rendered body.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.ctx.response.set(key, value);
    }

    /// Reports an error to the client.
    ///
    /// With the `json` render type the status is written and `message` is
    /// recorded under `"error"`, so rendering produces `{"error": message}`.
    /// Otherwise a plain-text error body is written.
    pub fn error(&mut self, status: StatusCode, message: impl Into<String>) {
        write_error(&mut self.ctx.response, &self.render_type, status, message.into());
    }

    /// Redirects the client to `location`.
    pub fn redirect(&mut self, status: StatusCode, location: &str) {
        self.ctx.response.redirect(status, location);
    }

    /// The controller's cache, if one was attached.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Returns true if a cache was attached.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }
}

impl<C> fmt::Debug for Invocation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("controller", &type_name::<C>())
            .field("ctx", &self.ctx)
            .field("render_type", &self.render_type)
            .field("has_cache", &self.cache.is_some())
            .finish()
    }
}

fn write_error(
    response: &mut ResponseContext,
    render_type: &str,
    status: StatusCode,
    message: String,
) {
    if render_type == JSON {
        response.write_header(status);
        response.set("error", message);
    } else {
        response.text_error(status, &message);
    }
}

/// Type-erased view of a [`Descriptor`], used by router backends.
pub trait Dispatch: Send + Sync + 'static {
    /// Controller type name, for diagnostics.
    fn name(&self) -> &str;

    /// Binds `methods` under `pattern`.
    ///
    /// Every operation must be declared on the controller. An operation
    /// already bound to another pattern is rejected unless `allow_override`
    /// is set.
    fn initialize(
        &self,
        pattern: &str,
        methods: &[(Method, String)],
        allow_override: bool,
    ) -> Result<(), ControllerError>;

    /// A handler serving requests matched by `pattern`.
    fn handler(&self, pattern: &str) -> ParamHandler;
}

struct Inner<C> {
    prototype: C,
    name: String,
    operations: RwLock<HashMap<String, Operation<C>>>,
    routes: RwLock<HashMap<String, HashMap<Method, String>>>,
    render_type: RwLock<Arc<str>>,
    cache: RwLock<Option<Arc<dyn Cache>>>,
}

/// A controller prototype with its operations and route bindings.
///
/// Cloning a descriptor is cheap and shares the bindings.
pub struct Descriptor<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Descriptor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Controller> Descriptor<C> {
    /// Creates a descriptor around `prototype`.
    pub fn new(prototype: C) -> Self {
        let render_type: Arc<str> = Arc::from(prototype.render_type().unwrap_or(JSON));
        let name = type_name::<C>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            inner: Arc::new(Inner {
                prototype,
                name,
                operations: RwLock::new(HashMap::new()),
                routes: RwLock::new(HashMap::new()),
                render_type: RwLock::new(render_type),
                cache: RwLock::new(None),
            }),
        }
    }

    /// Declares an async operation.
    pub fn operation<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Invocation<C>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.inner.operations.write().insert(name.into(), boxed_operation(f));
        self
    }

    /// Declares an operation that completes without awaiting.
    pub fn sync_operation<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Invocation<C>) + Send + Sync + 'static,
    {
        let op = boxed_operation(move |inv: &mut Invocation<C>| {
            f(inv);
            Box::pin(std::future::ready(()))
        });
        self.inner.operations.write().insert(name.into(), op);
        self
    }

    /// Overrides the render type.
    pub fn with_render_type(self, render_type: &str) -> Self {
        *self.inner.render_type.write() = Arc::from(render_type);
        self
    }

    /// Attaches a cache handed to every invocation.
    pub fn with_cache(self, cache: Arc<dyn Cache>) -> Self {
        self.set_cache(cache);
        self
    }

    /// Attaches a cache handed to every invocation.
    pub fn set_cache(&self, cache: Arc<dyn Cache>) {
        *self.inner.cache.write() = Some(cache);
    }

    /// The attached cache.
    pub fn cache(&self) -> Option<Arc<dyn Cache>> {
        self.inner.cache.read().clone()
    }

    /// Returns true if a cache is attached.
    pub fn has_cache(&self) -> bool {
        self.inner.cache.read().is_some()
    }

    /// Render type used for responses.
    pub fn render_type(&self) -> Arc<str> {
        Arc::clone(&self.inner.render_type.read())
    }

    /// Returns true if an operation named `name` is declared.
    pub fn has_operation(&self, name: &str) -> bool {
        self.inner.operations.read().contains_key(name)
    }

    /// Operation bound to `(pattern, method)`.
    pub fn bound_operation(&self, pattern: &str, method: &Method) -> Option<String> {
        self.inner
            .routes
            .read()
            .get(pattern)
            .and_then(|methods| methods.get(method))
            .cloned()
    }

    fn resolve(&self, pattern: &str, method: &Method) -> Option<(String, Operation<C>)> {
        let name = self.bound_operation(pattern, method)?;
        let op = self.inner.operations.read().get(&name).cloned()?;
        Some((name, op))
    }

    /// Serves one request matched by `pattern`.
    pub async fn serve(&self, pattern: Arc<str>, req: Request, params: Params) -> Response {
        let cancel = CancelSignal::of(&req).cloned();
        let request_id = RequestId::of(&req);
        let method = req.method().clone();

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let render_type = self.render_type();
        let mut invocation = Invocation {
            controller: self.inner.prototype.clone(),
            ctx: Context::new(RequestContext::new(parts, body, params, Arc::clone(&pattern))),
            render_type: Arc::clone(&render_type),
            cache: self.cache(),
        };

        match self.resolve(&pattern, &method) {
            Some((operation, op)) => {
                debug!(
                    controller = %self.inner.name,
                    %pattern,
                    %method,
                    %operation,
                    request_id = request_id.map(tracing::field::display),
                    "dispatching"
                );
                op(&mut invocation).await;
            }
            None => {
                warn!(controller = %self.inner.name, %pattern, %method, "no operation bound");
                invocation.error(
                    StatusCode::NOT_IMPLEMENTED,
                    format!("{} {pattern} is not implemented by {}", method, self.inner.name),
                );
            }
        }

        if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            info!(
                controller = %self.inner.name,
                %pattern,
                status = CLIENT_CLOSED_REQUEST,
                "client went away before render"
            );
            return empty_response(client_closed_request());
        }

        let Invocation { ctx, .. } = invocation;
        let mut response = ctx.response;
        if let Err(e) = response.render(&render_type) {
            error!(controller = %self.inner.name, %pattern, error = %e, "render failed");
            response.clear();
            write_error(
                &mut response,
                &render_type,
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            );
            if &*render_type == JSON {
                if let Err(e) = JsonRenderer.render(&mut response) {
                    warn!(
                        controller = %self.inner.name,
                        %pattern,
                        error = %e,
                        "error body render failed"
                    );
                }
            }
        }
        response.into_http()
    }
}

impl<C: Controller> Dispatch for Descriptor<C> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn initialize(
        &self,
        pattern: &str,
        methods: &[(Method, String)],
        allow_override: bool,
    ) -> Result<(), ControllerError> {
        {
            let operations = self.inner.operations.read();
            if let Some((_, missing)) = methods.iter().find(|(_, op)| !operations.contains_key(op)) {
                return Err(ControllerError::UnknownOperation {
                    name: missing.clone(),
                    controller: self.inner.name.clone(),
                });
            }
        }

        let mut routes = self.inner.routes.write();
        if !allow_override {
            for (_, op) in methods {
                let existing = routes
                    .iter()
                    .filter(|(bound_pattern, _)| bound_pattern.as_str() != pattern)
                    .find(|(_, bound)| bound.values().any(|name| name == op));
                if let Some((existing, _)) = existing {
                    return Err(ControllerError::OperationAlreadyBound {
                        name: op.clone(),
                        controller: self.inner.name.clone(),
                        existing: existing.clone(),
                        pattern: pattern.to_string(),
                    });
                }
            }
        }

        let table = routes.entry(pattern.to_string()).or_default();
        for (method, op) in methods {
            table.insert(method.clone(), op.clone());
        }
        debug!(controller = %self.inner.name, %pattern, bindings = methods.len(), "controller initialized");
        Ok(())
    }

    fn handler(&self, pattern: &str) -> ParamHandler {
        let descriptor = self.clone();
        let pattern: Arc<str> = Arc::from(pattern);
        param_handler_fn(move |req: Request, params: Params| {
            let descriptor = descriptor.clone();
            let pattern = Arc::clone(&pattern);
            async move { descriptor.serve(pattern, req, params).await }
        })
    }
}

impl<C> fmt::Debug for Descriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.inner.name)
            .field("operations", &self.inner.operations.read().keys().collect::<Vec<_>>())
            .field("routes", &*self.inner.routes.read())
            .field("render_type", &*self.inner.render_type.read())
            .finish()
    }
}

/// Collects the body of a response.
pub async fn body_bytes(response: Response) -> Bytes {
    match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}
