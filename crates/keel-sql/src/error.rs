//! Database errors.

use keel_core::RegistryError;
use thiserror::Error;

/// Result alias for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by drivers and the driver registry.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Introspection found no columns for the table.
    #[error("table {table} does not exist or has none of the columns {columns:?}")]
    TableDoesNotExist {
        /// `database.table`
        table: String,
        /// Columns that were asked for, empty for all
        columns: Vec<String>,
    },

    /// The connection config is unusable for this driver.
    #[error("invalid database config '{name}': {reason}")]
    InvalidConfig {
        /// Connection name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// A row lacked a column or held a value of the wrong shape.
    #[error("column '{column}' is missing or malformed in result row")]
    MalformedRow {
        /// Column name
        column: String,
    },

    /// Failure reported by the underlying database client, passed through
    /// unchanged.
    #[error(transparent)]
    Driver(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Driver registration or lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DatabaseError {
    /// Wraps a client error.
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Driver(Box::new(err))
    }
}
