//! HTTP handler types shared by the router, middleware and controller layers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use keel_router::Params;

/// The HTTP request type seen by handlers. Bodies are fully buffered.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by handlers.
pub type Response = http::Response<Full<Bytes>>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased request handler.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A request handler that also receives the path parameters of the match.
pub type ParamHandler =
    Arc<dyn Fn(Request, Params) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps an async function as a [`Handler`].
///
/// # Example
///
/// ```rust
/// use keel_core::{handler_fn, text_response, Request};
/// use http::StatusCode;
///
/// let handler = handler_fn(|_req: Request| async {
///     text_response(StatusCode::OK, "pong")
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Wraps an async function as a [`ParamHandler`].
pub fn param_handler_fn<F, Fut>(f: F) -> ParamHandler
where
    F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, params| Box::pin(f(req, params)))
}

/// Adapts a [`Handler`] to the parameter-receiving signature, dropping the params.
pub fn ignore_params(handler: Handler) -> ParamHandler {
    Arc::new(move |req, _params| handler(req))
}

/// Builds a response with the given status and no body.
pub fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Builds a `text/plain` response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// A plain `404 Not Found` handler.
pub fn not_found_handler() -> Handler {
    handler_fn(|_req| async { text_response(StatusCode::NOT_FOUND, "404 page not found\n") })
}

/// Builds an in-memory request, mostly useful in tests.
pub fn request(method: http::Method, uri: &str, body: impl Into<Bytes>) -> Request {
    let mut req = Request::new(Full::new(body.into()));
    *req.method_mut() = method;
    if let Ok(uri) = uri.parse() {
        *req.uri_mut() = uri;
    }
    req
}
