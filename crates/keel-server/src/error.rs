//! Router and server errors.

use http::Method;
use keel_cache::CacheError;
use keel_config::ConfigError;
use keel_controller::ControllerError;
use keel_core::RegistryError;
use keel_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while registering routes or materializing a router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A handler is already registered for this method and pattern.
    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute {
        /// HTTP method
        method: Method,
        /// Route pattern
        pattern: String,
    },

    /// The pattern cannot be inserted into the backend.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Route pattern
        pattern: String,
        /// What is wrong with it
        reason: String,
    },

    /// The route's controller rejected its bindings.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Router backend lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors raised while building or running a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No configuration was given to the builder.
    #[error("server configuration has not been loaded")]
    ConfigNotLoaded,

    /// The configuration names no router provider.
    #[error("no router provider configured")]
    NoRouterConfig,

    /// The configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured cache could not be opened.
    #[error("cache '{provider}': {source}")]
    Cache {
        /// Cache provider name
        provider: String,
        /// Underlying error
        #[source]
        source: CacheError,
    },

    /// Route registration or router materialization failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The listen address is invalid or cannot be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// I/O failure while serving.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
