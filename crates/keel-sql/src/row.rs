//! The query interface drivers consume.
//!
//! Keel does not ship a database client. An application hands the driver an
//! [`Executor`] backed by whatever client it uses; introspection queries go
//! through it and come back as [`Row`]s.

use indexmap::IndexMap;
use keel_core::BoxFuture;
use serde_json::Value;

use crate::error::{DatabaseError, DatabaseResult};

/// Runs parameterized queries.
pub trait Executor: Send + Sync {
    /// Executes `sql` with positional `args` and returns every row.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, DatabaseResult<Vec<Row>>>;
}

/// One result row: column name to value, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl Row {
    /// An empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column value.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Raw value of `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns true if `column` is absent or NULL.
    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).map_or(true, Value::is_null)
    }

    /// String value of `column`. Numbers are formatted.
    pub fn get_str(&self, column: &str) -> DatabaseResult<String> {
        self.get_opt_str(column).ok_or_else(|| malformed(column))
    }

    /// String value of `column`, `None` when NULL.
    pub fn get_opt_str(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Unsigned integer value of `column`. Numeric strings are parsed.
    pub fn get_u64(&self, column: &str) -> DatabaseResult<u64> {
        self.get_opt_u64(column).ok_or_else(|| malformed(column))
    }

    /// Unsigned integer value of `column`, `None` when NULL or not numeric.
    pub fn get_opt_u64(&self, column: &str) -> Option<u64> {
        match self.get(column)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Iterates columns in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn malformed(column: &str) -> DatabaseError {
    DatabaseError::MalformedRow {
        column: column.to_string(),
    }
}
