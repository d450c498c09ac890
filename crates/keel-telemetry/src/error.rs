//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up or writing logs.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A writer's background thread has stopped.
    #[error("log writer closed: {0}")]
    WriterClosed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
