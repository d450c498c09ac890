//! Pooled MySQL client.
//!
//! [`MySqlExecutor`] runs queries on an `sqlx` pool whose size is the
//! database's `max_open_conns`: the configured value, or the driver default
//! of 5. Client errors reach callers unchanged as [`DatabaseError::Driver`].

use std::sync::Arc;

use keel_config::DatabaseConfig;
use keel_core::BoxFuture;
use serde_json::Value;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow,
};
use sqlx::query::Query;
use sqlx::{Column as _, Row as _, ValueRef as _};
use tracing::debug;

use crate::driver::{open, resolve, Database};
use crate::error::{DatabaseError, DatabaseResult};
use crate::mysql;
use crate::row::{Executor, Row};

/// An [`Executor`] over a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Wraps an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Connects a pool for `config`, opening one connection up front.
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let (options, max_open_conns) = prepare(config)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(max_open_conns)
            .connect_with(options)
            .await
            .map_err(DatabaseError::driver)?;
        Ok(Self::new(pool))
    }

    /// Builds a pool for `config` that connects on first use.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn connect_lazy(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let (options, max_open_conns) = prepare(config)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(max_open_conns)
            .connect_lazy_with(options);
        Ok(Self::new(pool))
    }

    async fn fetch(&self, sql: &str, args: &[Value]) -> DatabaseResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind(query, arg);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::driver)?;
        debug!(rows = rows.len(), "query finished");
        rows.iter().map(convert_row).collect()
    }
}

impl Executor for MySqlExecutor {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, DatabaseResult<Vec<Row>>> {
        Box::pin(self.fetch(sql, args))
    }
}

/// Opens `config` on a connected MySQL pool.
pub async fn connect(config: DatabaseConfig) -> DatabaseResult<Database> {
    let executor = MySqlExecutor::connect(&config).await?;
    open(config, Arc::new(executor))
}

/// Opens `config` on a MySQL pool that connects on first query.
pub fn connect_lazy(config: DatabaseConfig) -> DatabaseResult<Database> {
    let executor = MySqlExecutor::connect_lazy(&config)?;
    open(config, Arc::new(executor))
}

/// Connect options and pool bound for a MySQL config.
fn prepare(config: &DatabaseConfig) -> DatabaseResult<(MySqlConnectOptions, u32)> {
    let driver = resolve(config)?;
    if driver.name() != mysql::NAME {
        return Err(DatabaseError::InvalidConfig {
            name: config.name.clone(),
            reason: format!("driver '{}' has no MySQL pool", driver.name()),
        });
    }
    let max_open_conns = config
        .max_open_conns
        .unwrap_or_else(|| driver.default_max_open_conns());
    Ok((connect_options(config), max_open_conns))
}

fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new().database(&config.database);
    if !config.host.is_empty() {
        options = options.host(&config.host);
    }
    if config.port != 0 {
        options = options.port(config.port);
    }
    if !config.user.is_empty() {
        options = options.username(&config.user);
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if let Some(charset) = config.params.get("charset") {
        options = options.charset(charset);
    }
    if let Some(collation) = config.params.get("collation") {
        options = options.collation(collation);
    }
    options
}

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

fn bind<'q>(query: MySqlQuery<'q>, value: &'q Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else if let Some(uint) = number.as_u64() {
                query.bind(uint)
            } else {
                query.bind(number.as_f64().unwrap_or_default())
            }
        }
        Value::String(text) => query.bind(text.as_str()),
        nested => query.bind(nested.to_string()),
    }
}

fn convert_row(row: &MySqlRow) -> DatabaseResult<Row> {
    row.columns()
        .iter()
        .map(|column| {
            column_value(row, column.ordinal(), column.name())
                .map(|value| (column.name().to_string(), value))
        })
        .collect()
}

/// Decodes one column into the narrowest JSON value that accepts it.
fn column_value(row: &MySqlRow, index: usize, name: &str) -> DatabaseResult<Value> {
    let raw = row.try_get_raw(index).map_err(DatabaseError::driver)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(uint) = row.try_get::<u64, _>(index) {
        return Ok(uint.into());
    }
    if let Ok(int) = row.try_get::<i64, _>(index) {
        return Ok(int.into());
    }
    if let Ok(float) = row.try_get::<f64, _>(index) {
        return Ok(float.into());
    }
    if let Ok(text) = row.try_get::<String, _>(index) {
        return Ok(text.into());
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(String::from_utf8_lossy(&bytes).into_owned().into());
    }
    Err(DatabaseError::MalformedRow {
        column: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            name: "main".into(),
            driver: "mysql".into(),
            host: "db.internal".into(),
            port: 3307,
            user: "app".into(),
            password: "secret".into(),
            database: "shop".into(),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_prepare_uses_driver_default() {
        let (_, bound) = prepare(&config()).unwrap();
        assert_eq!(bound, mysql::DEFAULT_MAX_OPEN_CONNS);
    }

    #[test]
    fn test_prepare_uses_configured_bound() {
        let mut cfg = config();
        cfg.max_open_conns = Some(12);
        let (_, bound) = prepare(&cfg).unwrap();
        assert_eq!(bound, 12);
    }

    #[test]
    fn test_prepare_rejects_missing_database() {
        let mut cfg = config();
        cfg.database.clear();
        let err = prepare(&cfg).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfig { .. }));
    }

    #[test]
    fn test_prepare_rejects_unset_driver() {
        let mut cfg = config();
        cfg.driver.clear();
        let err = prepare(&cfg).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfig { .. }));
    }

    #[test]
    fn test_client_error_passes_through() {
        let err = DatabaseError::driver(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
        let DatabaseError::Driver(inner) = err else {
            panic!("expected a driver error");
        };
        assert!(matches!(
            inner.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::RowNotFound)
        ));
    }
}
