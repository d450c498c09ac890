//! # Keel
//!
//! A controller-oriented HTTP framework. Controllers expose named
//! operations, routes bind HTTP methods to those operations, and every
//! request runs on its own copy of the controller.
//!
//! Backends are pluggable by name: router (`radix`), cache (`memory`),
//! configuration readers (`json`, `toml`) and SQL drivers (`mysql`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keel::prelude::*;
//!
//! #[derive(Clone, Default)]
//! struct Hello;
//! impl Controller for Hello {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hello = Descriptor::new(Hello)
//!         .sync_operation("Get", |inv: &mut Invocation<Hello>| inv.set("hello", "world"));
//!
//!     let mut server = Server::builder().config_file("config/app.json").build()?;
//!     server.init_logging()?;
//!     server
//!         .router_mut()
//!         .public_route("/", &hello, RouteConfig::new("get:Get"))?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! connection → RequestId → AccessLog → router → [guard] → route middleware → controller
//!                                                                              ↓
//! response ←────────────────── render (json / text) ←────── operation ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/keel/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use keel_cache as cache;
pub use keel_config as config;
pub use keel_controller as controller;
pub use keel_core as core;
pub use keel_middleware as middleware;
pub use keel_router as router;
pub use keel_server as server;
pub use keel_sql as sql;
pub use keel_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use keel::prelude::*;
///
/// let chain = ParamChain::default();
/// assert!(chain.is_empty());
/// ```
pub mod prelude {
    pub use keel_core::{
        handler_fn, param_handler_fn, text_response, CancelSignal, Handler, ParamHandler, Params,
        Request, RequestId, Response,
    };

    pub use keel_controller::{
        Controller, ControllerError, Descriptor, Dispatch, Invocation, RouteConfig,
    };

    pub use keel_middleware::{middleware_fn, param_middleware_fn, Chain, ParamChain};

    pub use keel_cache::{Cache, CacheError, CacheExt};

    pub use keel_config::{parse, AppConfig, ConfigError, ParseOptions};

    pub use keel_sql::{Database, DatabaseError, Driver};

    pub use keel_server::{RouterError, RouterManager, Server, ServerError, ShutdownSignal};

    pub use keel_telemetry::{init_logging, LogConfig};
}
