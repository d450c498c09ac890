//! # Keel Controller
//!
//! The request lifecycle of a Keel route:
//!
//! 1. a router backend matches a request and calls the route's handler,
//! 2. the [`Descriptor`] clones its prototype controller into an
//!    [`Invocation`] with a fresh [`Context`],
//! 3. the operation bound to `(pattern, method)` runs and records response
//!    data with [`Invocation::set`],
//! 4. unless the client went away, the data is rendered (`json` by default).
//!
//! Routes are configured with a [`RouteConfig`] such as `"get:Get,post:Create"`.

#![doc(html_root_url = "https://docs.rs/keel-controller/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod controller;
mod error;
pub mod render;
mod route_config;

pub use context::{Context, RequestContext, ResponseContext};
pub use controller::{
    body_bytes, Controller, Descriptor, Dispatch, Invocation, Operation, CLIENT_CLOSED_REQUEST,
};
pub use error::{ControllerError, RenderError};
pub use render::{register_renderer, Renderer};
pub use route_config::{parse_bindings, RouteConfig};
