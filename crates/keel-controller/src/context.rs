//! Per-request context: the inbound request and the response being built.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::request::Parts;
use http::{Method, StatusCode, Uri};
use http_body_util::Full;
use indexmap::IndexMap;
use keel_core::{CancelSignal, Params, RequestId};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RenderError;
use crate::render::renderer;

/// Request and response of one invocation.
#[derive(Debug)]
pub struct Context {
    /// The inbound side.
    pub request: RequestContext,
    /// The outbound side.
    pub response: ResponseContext,
}

impl Context {
    /// Binds a context to a request.
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            response: ResponseContext::new(),
        }
    }
}

/// The inbound request with its path parameters and matched pattern.
#[derive(Debug)]
pub struct RequestContext {
    parts: Parts,
    body: Bytes,
    params: Params,
    pattern: Arc<str>,
}

impl RequestContext {
    /// Creates a request context from already collected parts.
    pub fn new(parts: Parts, body: Bytes, params: Params, pattern: Arc<str>) -> Self {
        Self {
            parts,
            body,
            params,
            pattern,
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Request URI.
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Path portion of the URI.
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// A header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Path parameters captured by the router.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The route pattern that matched.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Request id assigned by the server or middleware.
    pub fn request_id(&self) -> Option<RequestId> {
        self.parts.extensions.get::<RequestId>().copied()
    }

    /// Cancellation signal attached by the server.
    pub fn cancel_signal(&self) -> Option<&CancelSignal> {
        self.parts.extensions.get::<CancelSignal>()
    }

    /// Returns true if the client has stopped waiting.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_signal().is_some_and(CancelSignal::is_cancelled)
    }

    /// Typed request extensions.
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }
}

/// The response under construction.
///
/// Operations accumulate key/value data with [`set`](Self::set); the render
/// step turns that data into the body. The status follows first-write-wins:
/// once written, later writes are ignored.
#[derive(Debug, Default)]
pub struct ResponseContext {
    status: Option<StatusCode>,
    headers: HeaderMap,
    data: IndexMap<String, Value>,
    body: BytesMut,
}

impl ResponseContext {
    /// An empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `key`. Later writes to the same key replace the
    /// value and keep the key's original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Serializes `value` and records it under `key`.
    pub fn set_json<T: serde::Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), RenderError> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// All recorded data, in insertion order.
    pub fn data(&self) -> &IndexMap<String, Value> {
        &self.data
    }

    /// Writes the status if none has been written yet.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Returns true once a status has been written.
    pub fn is_status_written(&self) -> bool {
        self.status.is_some()
    }

    /// Effective status, `200 OK` if none was written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header unless one with that name already exists.
    pub fn default_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.entry(name).or_insert(value);
    }

    /// Appends raw bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sends the client to `location` with `status`.
    ///
    /// An invalid location leaves the header unset.
    pub fn redirect(&mut self, status: StatusCode, location: &str) {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                self.headers.insert(header::LOCATION, value);
            }
            Err(_) => tracing::warn!(location, "redirect target is not a valid header value"),
        }
        self.write_header(status);
    }

    /// Writes a plain-text error: status, `text/plain` and `message` plus a
    /// newline.
    pub fn text_error(&mut self, status: StatusCode, message: &str) {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        self.write_header(status);
        self.write(message.as_bytes());
        self.write(b"\n");
    }

    /// Renders the accumulated data with the renderer registered as
    /// `render_type`.
    pub fn render(&mut self, render_type: &str) -> Result<(), RenderError> {
        renderer(render_type)?.render(self)
    }

    /// Drops everything written so far.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Converts into an HTTP response.
    pub fn into_http(self) -> keel_core::Response {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_last_write_wins() {
        let mut response = ResponseContext::new();
        response.set("a", 1);
        response.set("b", 2);
        response.set("a", 3);

        let keys: Vec<_> = response.data().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(response.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn test_first_status_wins() {
        let mut response = ResponseContext::new();
        assert_eq!(response.status(), StatusCode::OK);
        response.write_header(StatusCode::TEMPORARY_REDIRECT);
        response.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn test_redirect_sets_location() {
        let mut response = ResponseContext::new();
        response.redirect(StatusCode::TEMPORARY_REDIRECT, "/x");
        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(http.headers()[header::LOCATION], "/x");
    }

    #[test]
    fn test_text_error() {
        let mut response = ResponseContext::new();
        response.text_error(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(response.body(), b"bad input\n");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_clear() {
        let mut response = ResponseContext::new();
        response.set("k", "v");
        response.write(b"partial");
        response.write_header(StatusCode::ACCEPTED);
        response.clear();
        assert!(response.data().is_empty());
        assert!(response.body().is_empty());
        assert!(!response.is_status_written());
    }
}
