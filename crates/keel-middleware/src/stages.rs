//! Stock middleware.

use std::sync::Arc;
use std::time::Instant;

use http::HeaderValue;
use keel_core::{handler_fn, Handler, Request, RequestId};

use crate::chain::{middleware_fn, Middleware};

/// Header carrying the request id on responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensures every request carries a [`RequestId`] and echoes it back in the
/// `x-request-id` response header.
///
/// An id already present in the request extensions (the server assigns one
/// per request) is kept.
pub fn request_id() -> Middleware {
    middleware_fn(|next: Handler| -> Handler {
        handler_fn(move |mut req: Request| {
            let next = Arc::clone(&next);
            let id = RequestId::of(&req).unwrap_or_else(|| {
                let id = RequestId::new();
                req.extensions_mut().insert(id);
                id
            });
            async move {
                let mut res = next(req).await;
                if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                    res.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                res
            }
        })
    })
}

/// Logs one `tracing` event per request with method, path, status and latency.
pub fn access_log() -> Middleware {
    middleware_fn(|next: Handler| -> Handler {
        handler_fn(move |req: Request| {
            let next = Arc::clone(&next);
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let request_id = RequestId::of(&req).map(tracing::field::display);
            async move {
                let started = Instant::now();
                let res = next(req).await;
                let status = res.status().as_u16();
                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if status >= 500 {
                    tracing::warn!(%method, %path, status, latency_ms, request_id, "request completed");
                } else {
                    tracing::info!(%method, %path, status, latency_ms, request_id, "request completed");
                }
                res
            }
        })
    })
}
