//! # Keel Middleware
//!
//! Ordered middleware chains for Keel handlers.
//!
//! [`Chain`] wraps plain [`keel_core::Handler`]s, [`ParamChain`] wraps
//! handlers that also receive path parameters. Both apply their middleware
//! right to left: for `[A, B]` around `H` the call order is
//! `A-pre, B-pre, H, B-post, A-post`.

#![doc(html_root_url = "https://docs.rs/keel-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
pub mod stages;

pub use chain::{
    lift, middleware_fn, param_middleware_fn, Chain, Middleware, ParamChain, ParamMiddleware,
};
