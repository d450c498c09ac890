//! # Keel Server
//!
//! Routing and HTTP serving for Keel applications.
//!
//! - [`RouterManager`]: the router facade. Controller routes, the favicon,
//!   static directories and the not-found handler are registered here and
//!   materialized on a named [`RouterBackend`].
//! - [`backend`]: the router backend registry and the built-in `radix`
//!   backend.
//! - [`static_files`]: static directories and the favicon.
//! - [`Server`]: builds caches and the router from an [`AppConfig`] and
//!   serves HTTP/1.1 with graceful shutdown.
//!
//! [`AppConfig`]: keel_config::AppConfig

#![doc(html_root_url = "https://docs.rs/keel-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
mod error;
mod manager;
mod server;
mod shutdown;
pub mod static_files;

pub use backend::{register_backend, RadixBackend, RouterBackend, RADIX};
pub use error::{RouterError, ServerError};
pub use manager::{RouterManager, FAVICON_PATH};
pub use server::{Server, ServerBuilder, DEFAULT_SHUTDOWN_TIMEOUT_SECS};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
