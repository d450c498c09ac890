//! # Keel Core
//!
//! Foundation types shared by every Keel crate:
//!
//! - [`registry::Registry`] - named backend factories, one registry per backend family
//! - [`Handler`] / [`ParamHandler`] - type-erased async request handlers
//! - [`CancelSignal`] - fires when the client stops waiting for a response
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/keel-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod handler;
pub mod registry;
mod request_id;

pub use cancel::{CancelGuard, CancelSignal};
pub use handler::{
    empty_response, handler_fn, ignore_params, not_found_handler, param_handler_fn, request,
    text_response, BoxFuture, Handler, ParamHandler, Request, Response,
};
pub use keel_router::Params;
pub use registry::{Registry, RegistryError};
pub use request_id::RequestId;
