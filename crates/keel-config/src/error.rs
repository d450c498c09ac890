//! Configuration error types.

use std::path::PathBuf;

use keel_core::RegistryError;
use thiserror::Error;

/// Errors that can occur while reading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No reader name was given.
    #[error("no configuration reader specified")]
    NoReader,

    /// No reader is registered under this name.
    #[error("configuration reader '{0}' does not exist")]
    ReaderNotExist(String),

    /// A reader is already registered under this name.
    #[error("configuration reader '{0}' already exists")]
    ReaderAlreadyExists(String),

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read a configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A `.env` file exists but could not be loaded.
    #[error("failed to load env file {path}: {reason}")]
    DotenvError {
        /// Path to the env file.
        path: PathBuf,
        /// Loader message.
        reason: String,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing or decoding error.
    #[error("failed to decode JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// Dotted path of the field.
        field: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for ConfigError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EmptyBackend { .. } => Self::NoReader,
            RegistryError::DuplicateBackend { name, .. } => Self::ReaderAlreadyExists(name),
            RegistryError::UnknownBackend { name, .. } => Self::ReaderNotExist(name),
        }
    }
}
