//! Test error types.

use thiserror::Error;

/// Errors that can occur while driving a handler in tests.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body could not be read.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A redirect chain exceeded the client's limit.
    #[error("stopped after {limit} redirects")]
    TooManyRedirects {
        /// Maximum redirects followed
        limit: usize,
    },

    /// A redirect response carried no usable `Location`.
    #[error("redirect without a usable location: {0}")]
    InvalidRedirect(String),

    /// The handler task panicked or was aborted.
    #[error("handler failed: {0}")]
    Handler(String),
}
