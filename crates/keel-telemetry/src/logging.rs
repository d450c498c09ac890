//! Subscriber setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter`, a JSON or
//! pretty `fmt` layer and, optionally, a [`LevelLayer`] feeding a
//! [`Logger`].
//!
//! # Example
//!
//! ```rust,ignore
//! use keel_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(pattern = "/users/{id}", "route registered");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::logger::{LevelLayer, Logger};
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "keel_server=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Builds a config from a level directive and output format.
    #[must_use]
    pub fn from_level(level: impl Into<String>, json: bool) -> Self {
        Self {
            level: level.into(),
            json_format: json,
            ..Self::default()
        }
    }
}

/// Initializes the global subscriber.
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    init(config, None)
}

/// Like [`init_logging`], additionally forwarding every event to `logger`.
pub fn init_logging_with(config: &LogConfig, logger: Logger) -> TelemetryResult<()> {
    init(config, Some(logger))
}

fn init(config: &LogConfig, logger: Option<Logger>) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(logger.map(LevelLayer::new))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Creates an env filter from a directive string.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

/// Field names used across Keel's log events.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";
    /// Route pattern.
    pub const PATTERN: &str = "pattern";
    /// HTTP method.
    pub const METHOD: &str = "method";
    /// Controller operation name.
    pub const OPERATION: &str = "operation";
    /// HTTP status code.
    pub const STATUS: &str = "status";
    /// Controller type name.
    pub const CONTROLLER: &str = "controller";
}
