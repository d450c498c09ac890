//! Controller and rendering errors.

use keel_core::RegistryError;
use thiserror::Error;

/// Errors raised while binding routes to a controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The route names an operation the controller does not declare.
    #[error("operation '{name}' is not declared on controller {controller}")]
    UnknownOperation {
        /// Operation name from the route config
        name: String,
        /// Controller type name
        controller: String,
    },

    /// The operation is already bound under another pattern and the route
    /// does not allow reuse.
    #[error("operation '{name}' of {controller} is already bound to '{existing}', cannot bind it to '{pattern}'")]
    OperationAlreadyBound {
        /// Operation name
        name: String,
        /// Controller type name
        controller: String,
        /// Pattern the operation is bound to
        existing: String,
        /// Pattern that was rejected
        pattern: String,
    },

    /// The method-to-operation mapping uses an HTTP method outside the
    /// supported set.
    #[error("unsupported HTTP method '{0}' in route config")]
    UnsupportedMethod(String),

    /// The method-to-operation mapping could not be parsed.
    #[error("malformed method mapping '{0}', expected 'method:Operation[,method:Operation]'")]
    MalformedMapping(String),
}

/// Errors raised while rendering a response body.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No renderer is registered under the requested render type.
    #[error("unknown render type '{0}'")]
    UnknownRenderer(String),

    /// The renderer could not serialize the response data.
    #[error("render serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Renderer registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A custom renderer failed.
    #[error("render failed: {0}")]
    Custom(String),
}
