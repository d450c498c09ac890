//! Radix tree path matcher for Keel.
//!
//! The router stores an arbitrary value per (pattern, method) pair. The
//! server's default router backend stores request handlers; tests and
//! tooling can store plain names.
//!
//! # Patterns
//!
//! - static segments: `/users`
//! - named parameters: `/users/{id}` or `/users/:id`
//! - trailing catch-all: `/files/*path`
//!
//! # Example
//!
//! ```rust
//! use keel_router::{MethodRouter, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router
//!     .insert(
//!         "/users",
//!         MethodRouter::new()
//!             .with(Method::GET, "listUsers")
//!             .with(Method::POST, "createUser"),
//!     )
//!     .unwrap();
//! router
//!     .insert("/files/*path", MethodRouter::new().with(Method::GET, "serveFile"))
//!     .unwrap();
//!
//! let m = router.match_route(&Method::GET, "/files/css/site.css").unwrap();
//! assert_eq!(*m.value, "serveFile");
//! assert_eq!(m.params.get("path"), Some("css/site.css"));
//! ```

mod method_router;
mod node;
mod params;
mod router;

use http::Method;

pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::Router;

/// A matched route: the stored value plus captured parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// Value registered for the matched pattern and method
    pub value: &'a T,
    /// Captured path parameters
    pub params: Params,
}

/// Errors raised while inserting a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// These methods were already registered for the pattern.
    Conflict(Vec<Method>),
    /// A catch-all segment was followed by more segments.
    WildcardNotLast(String),
    /// Two patterns disagree on the parameter name at the same position.
    ParamMismatch {
        /// Segment already in the tree
        existing: String,
        /// Segment being inserted
        inserted: String,
    },
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                write!(f, "method(s) already registered: {}", names.join(", "))
            }
            Self::WildcardNotLast(path) => {
                write!(f, "catch-all must be the last segment in '{path}'")
            }
            Self::ParamMismatch { existing, inserted } => {
                write!(f, "parameter '{inserted}' conflicts with existing '{existing}'")
            }
        }
    }
}

impl std::error::Error for InsertError {}
