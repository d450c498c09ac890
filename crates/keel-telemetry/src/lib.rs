//! # Keel Telemetry
//!
//! Logging for Keel services.
//!
//! - [`logging`] installs the global `tracing` subscriber.
//! - [`logger`] is a level-routed logger with console and file writers that
//!   can also receive `tracing` events through [`logger::LevelLayer`].

#![doc(html_root_url = "https://docs.rs/keel-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logger;
pub mod logging;

pub use error::TelemetryError;
pub use logger::{ConsoleWriter, Entry, FileWriter, Level, LevelLayer, LogWriter, Logger};
pub use logging::{init_logging, init_logging_with, LogConfig};

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
