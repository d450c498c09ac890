//! Test request building.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::Full;
use keel_core::Request;
use serde::Serialize;

use crate::error::TestError;

/// A fully built test request.
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Converts to the request type handlers take.
    pub fn into_http_request(self) -> Request {
        let mut req = Request::new(Full::new(self.body));
        *req.method_mut() = self.method;
        *req.uri_mut() = self.uri;
        *req.headers_mut() = self.headers;
        req
    }
}

/// Builder for [`TestRequest`].
///
/// Invalid headers or bodies are reported by [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Starts a request with `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            error: None,
        }
    }

    /// Sets a header, replacing earlier values.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => self.fail(TestError::InvalidHeader(err.to_string())),
            (_, Err(err)) => self.fail(TestError::InvalidHeader(err.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and content type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(err) => self.fail(TestError::Json(err)),
        }
        self.content_type("application/json")
    }

    /// Finishes the request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
        })
    }

    fn fail(&mut self, err: TestError) {
        self.error.get_or_insert(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_with_json_body() {
        let req = TestRequest::post("/users")
            .json(&json!({"name": "alice"}))
            .build()
            .unwrap();

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(&req.body[..], br#"{"name":"alice"}"#);
    }

    #[test]
    fn test_invalid_header_is_reported_on_build() {
        let err = TestRequest::get("/").header("bad header", "x").build().unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("http://[::1").build().unwrap_err();
        assert!(matches!(err, TestError::RequestBuild(_)));
    }

    #[test]
    fn test_into_http_request_keeps_parts() {
        let req = TestRequest::get("/a?b=c")
            .header("x-trace", "1")
            .build()
            .unwrap()
            .into_http_request();

        assert_eq!(req.uri().query(), Some("b=c"));
        assert_eq!(req.headers()["x-trace"], "1");
    }
}
