//! Static file serving.
//!
//! Files are served from a root directory under a URL prefix. Directory
//! listings are never produced: a request whose path ends with `/`, or that
//! resolves to a directory, gets `404`.
//!
//! # Security
//!
//! - Path traversal is rejected (`..` segments)
//! - Hidden files (starting with `.`) are rejected unless enabled
//! - Resolved paths must stay inside the canonical root
//!
//! # Example
//!
//! ```rust
//! use keel_server::static_files::StaticFiles;
//!
//! let files = StaticFiles::new("./public").mime_type("wasm", "application/wasm");
//! assert_eq!(files.root(), std::path::Path::new("./public"));
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use http_body_util::Full;
use keel_core::{handler_fn, param_handler_fn, text_response, Handler, ParamHandler, Params, Response};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the catch-all parameter static directory routes capture.
pub const FILE_PARAM: &str = "filepath";

/// Errors that can occur when serving static files.
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// The requested file was not found.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path is forbidden (traversal or hidden file).
    #[error("forbidden path: {0}")]
    Forbidden(String),

    /// Only GET and HEAD are served.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// I/O error while reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StaticFileError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text response for this error.
    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("error").to_lowercase();
        let mut response = text_response(status, format!("{} {reason}\n", status.as_u16()));
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        }
        response
    }
}

/// A directory of files served over HTTP.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    serve_hidden: bool,
    mime_types: HashMap<String, String>,
}

impl StaticFiles {
    /// Serves files below `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            serve_hidden: false,
            mime_types: HashMap::new(),
        }
    }

    /// Allows files and directories whose name starts with `.`.
    #[must_use]
    pub fn serve_hidden(mut self, enabled: bool) -> Self {
        self.serve_hidden = enabled;
        self
    }

    /// Overrides the content type for an extension.
    #[must_use]
    pub fn mime_type<S1: Into<String>, S2: Into<String>>(mut self, extension: S1, mime: S2) -> Self {
        self.mime_types
            .insert(extension.into().to_lowercase(), mime.into());
        self
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serves `request_path` relative to the root.
    ///
    /// A trailing `/` or a path naming a directory is `NotFound`.
    pub async fn handle(
        &self,
        request_path: &str,
        method: &Method,
    ) -> Result<Response, StaticFileError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(StaticFileError::MethodNotAllowed);
        }
        if request_path.is_empty() || request_path.ends_with('/') {
            return Err(StaticFileError::NotFound(request_path.to_string()));
        }

        let file_path = self.resolve_path(request_path).await?;
        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;
        if !metadata.is_file() {
            return Err(StaticFileError::NotFound(request_path.to_string()));
        }

        let mime_type = self.detect_mime_type(&file_path);
        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(tokio::fs::read(&file_path).await?)
        };
        debug!(path = %file_path.display(), bytes = metadata.len(), "static file served");
        Ok(build_response(body, metadata.len(), &mime_type))
    }

    /// A route handler reading the file path from the `filepath` parameter.
    ///
    /// The raw request path is checked for a trailing `/` since the matcher
    /// drops empty segments.
    pub fn into_handler(self) -> ParamHandler {
        let files = Arc::new(self);
        param_handler_fn(move |req, params: Params| {
            let files = Arc::clone(&files);
            async move {
                if req.uri().path().ends_with('/') {
                    return StaticFileError::NotFound(req.uri().path().to_string()).into_response();
                }
                let tail = params.get(FILE_PARAM).unwrap_or_default().to_string();
                match files.handle(&tail, req.method()).await {
                    Ok(response) => response,
                    Err(err) => {
                        debug!(path = %req.uri().path(), error = %err, "static file rejected");
                        err.into_response()
                    }
                }
            }
        })
    }

    async fn resolve_path(&self, request_path: &str) -> Result<PathBuf, StaticFileError> {
        let path = request_path.trim_start_matches('/');

        for component in Path::new(path).components() {
            match component {
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticFileError::Forbidden(
                        "directory traversal not allowed".to_string(),
                    ));
                }
                Component::Normal(name) => {
                    let hidden = name.to_str().is_some_and(|n| n.starts_with('.'));
                    if hidden && !self.serve_hidden {
                        return Err(StaticFileError::Forbidden(
                            "hidden files not allowed".to_string(),
                        ));
                    }
                }
                Component::CurDir => {}
            }
        }

        let canonical = tokio::fs::canonicalize(self.root.join(path))
            .await
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;
        let canonical_root = tokio::fs::canonicalize(&self.root).await?;
        if !canonical.starts_with(&canonical_root) {
            return Err(StaticFileError::Forbidden(
                "path escapes root directory".to_string(),
            ));
        }
        Ok(canonical)
    }

    fn detect_mime_type(&self, path: &Path) -> String {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if let Some(mime) = self.mime_types.get(&extension) {
            return mime.clone();
        }
        mime_for_extension(&extension).to_string()
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",

        _ => "application/octet-stream",
    }
}

fn build_response(body: Bytes, length: u64, mime_type: &str) -> Response {
    let mut response = Response::new(Full::new(body));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// Serves a single icon file at `/favicon.ico`.
///
/// Every successful response is logged with its status.
pub fn favicon_handler(path: impl Into<PathBuf>) -> Handler {
    let path: Arc<Path> = Arc::from(path.into());
    handler_fn(move |req| {
        let path = Arc::clone(&path);
        async move {
            if req.method() != Method::GET && req.method() != Method::HEAD {
                return StaticFileError::MethodNotAllowed.into_response();
            }
            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "favicon unavailable");
                    return StaticFileError::NotFound(req.uri().path().to_string()).into_response();
                }
            };
            let length = contents.len() as u64;
            let body = if req.method() == Method::HEAD {
                Bytes::new()
            } else {
                Bytes::from(contents)
            };
            info!(path = %req.uri().path(), status = StatusCode::OK.as_u16(), "favicon served");
            build_response(body, length, mime_for_extension("ico"))
        }
    })
}
