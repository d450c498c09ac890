//! Test client for in-memory HTTP testing.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, Method, StatusCode, Uri};
use keel_core::{CancelSignal, Handler, RequestId};
use keel_server::{RouterError, RouterManager};
use serde::Serialize;
use tracing::debug;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Drives a [`Handler`] without a network.
///
/// Each request gets a fresh [`RequestId`] and [`CancelSignal`], the same as
/// under the real server.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use keel_core::{handler_fn, text_response};
/// use keel_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let client = TestClient::new(handler_fn(|_req| async {
///     text_response(StatusCode::OK, "pong")
/// }));
///
/// let response = client.get("/ping").send().await.unwrap();
/// response.assert_status(StatusCode::OK).assert_body_eq("pong");
/// # });
/// ```
#[must_use]
#[derive(Clone)]
pub struct TestClient {
    handler: Handler,
    default_headers: Vec<(String, String)>,
    follow_redirects: bool,
    max_redirects: usize,
}

impl TestClient {
    /// A client sending every request to `handler`.
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            default_headers: Vec::new(),
            follow_redirects: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// A client for the handler `router` materializes.
    pub fn from_router(router: &RouterManager) -> Result<Self, RouterError> {
        Ok(Self::new(router.handler()?))
    }

    /// Follows `3xx` responses that carry a `Location`.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Caps the number of redirects followed.
    pub fn max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = limit;
        self
    }

    /// Adds a header to every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a HEAD request.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    async fn send_internal(&self, mut request: TestRequest) -> Result<TestResponse, TestError> {
        let mut redirects = 0;
        loop {
            let response = self.dispatch(request.clone(), None).await?;
            if !self.follow_redirects || !response.status().is_redirection() {
                return Ok(response);
            }
            if redirects == self.max_redirects {
                return Err(TestError::TooManyRedirects {
                    limit: self.max_redirects,
                });
            }
            redirects += 1;

            let location = response
                .header_str(header::LOCATION.as_str())
                .ok_or_else(|| TestError::InvalidRedirect("missing Location".to_string()))?;
            debug!(status = response.status_code(), %location, "following redirect");
            request = redirect_request(request, response.status(), location)?;
        }
    }

    /// Runs one request, cancelling it after `cancel_after` if given.
    async fn dispatch(
        &self,
        request: TestRequest,
        cancel_after: Option<Duration>,
    ) -> Result<TestResponse, TestError> {
        let mut req = request.into_http_request();
        req.extensions_mut().insert(RequestId::new());
        let signal = CancelSignal::new();
        signal.attach(&mut req);

        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move { handler(req).await });
        if let Some(delay) = cancel_after {
            tokio::time::sleep(delay).await;
            signal.cancel();
        }

        let response = task
            .await
            .map_err(|err| TestError::Handler(err.to_string()))?;
        TestResponse::from_http(response).await
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("default_headers", &self.default_headers)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

/// The request a redirect leads to.
///
/// 307 and 308 repeat the method and body; other redirects become a
/// body-less GET (HEAD stays HEAD).
fn redirect_request(
    previous: TestRequest,
    status: StatusCode,
    location: &str,
) -> Result<TestRequest, TestError> {
    let target: Uri = location
        .parse()
        .map_err(|_| TestError::InvalidRedirect(location.to_string()))?;
    let uri = match target.path_and_query() {
        Some(path) if target.scheme().is_some() || location.starts_with('/') => {
            path.as_str().parse::<Uri>()
        }
        _ => relative_to(&previous.uri, location).parse::<Uri>(),
    }
    .map_err(|_| TestError::InvalidRedirect(location.to_string()))?;

    let keep_method = matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    ) || previous.method == Method::HEAD;

    let mut headers = previous.headers;
    let (method, body) = if keep_method {
        (previous.method, previous.body)
    } else {
        headers.remove(header::CONTENT_TYPE);
        headers.remove(header::CONTENT_LENGTH);
        (Method::GET, Bytes::new())
    };

    Ok(TestRequest {
        method,
        uri,
        headers,
        body,
    })
}

fn relative_to(base: &Uri, location: &str) -> String {
    let path = base.path();
    let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
    format!("{dir}{location}")
}

/// A request being built for a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request, following redirects if the client does.
    pub async fn send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.send_internal(request).await
    }

    /// Sends the request and fires its cancellation signal after `delay`,
    /// as if the client had gone away.
    ///
    /// Redirects are not followed.
    pub async fn send_cancelled_after(self, delay: Duration) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.dispatch(request, Some(delay)).await
    }
}
