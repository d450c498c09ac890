//! Driver trait, opened databases and the driver registry.

use std::fmt;
use std::sync::{Arc, OnceLock};

use keel_config::DatabaseConfig;
use keel_core::{BoxFuture, Registry};
use tracing::info;

use crate::error::{DatabaseError, DatabaseResult};
use crate::mysql::MySqlDriver;
use crate::row::Executor;
use crate::schema::{Column, ColumnType, ForeignKey, Placeholder};

/// Dialect knowledge for one database engine.
pub trait Driver: Send + Sync + 'static {
    /// Registry name, e.g. `"mysql"`.
    fn name(&self) -> &'static str;

    /// Pool bound used when the config leaves `maxOpenConns` unset.
    fn default_max_open_conns(&self) -> u32 {
        0
    }

    /// Rejects configs the driver cannot connect with.
    fn validate(&self, config: &DatabaseConfig) -> DatabaseResult<()> {
        let _ = config;
        Ok(())
    }

    /// Character used to quote identifiers.
    fn quote_character_column(&self) -> char;

    /// Bind-parameter syntax.
    fn placeholder(&self) -> Placeholder;

    /// Columns of `database.table`, optionally restricted to `columns`.
    ///
    /// Fails with [`DatabaseError::TableDoesNotExist`] when nothing matches.
    fn describe<'a>(
        &'a self,
        executor: &'a dyn Executor,
        database: &'a str,
        table: &'a str,
        columns: &'a [&'a str],
    ) -> BoxFuture<'a, DatabaseResult<Vec<Column>>>;

    /// Foreign keys declared on `database.table`.
    fn foreign_keys<'a>(
        &'a self,
        executor: &'a dyn Executor,
        database: &'a str,
        table: &'a str,
    ) -> BoxFuture<'a, DatabaseResult<Vec<ForeignKey>>>;

    /// Normalizes a declared type. `None` for types outside the taxonomy.
    fn type_mapping(&self, declared: &str, column: &Column) -> Option<ColumnType>;
}

/// A driver bound to a connection config and an executor.
#[derive(Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
    config: DatabaseConfig,
    executor: Arc<dyn Executor>,
}

impl Database {
    /// The executor queries run on.
    pub fn connection(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// The config the database was opened with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The dialect driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Effective pool bound: the configured value or the driver default.
    pub fn max_open_conns(&self) -> u32 {
        self.config
            .max_open_conns
            .unwrap_or_else(|| self.driver.default_max_open_conns())
    }

    /// Columns of `table` in the configured database.
    pub async fn describe(&self, table: &str, columns: &[&str]) -> DatabaseResult<Vec<Column>> {
        self.driver
            .describe(self.executor.as_ref(), &self.config.database, table, columns)
            .await
    }

    /// Foreign keys of `table` in the configured database.
    pub async fn foreign_keys(&self, table: &str) -> DatabaseResult<Vec<ForeignKey>> {
        self.driver
            .foreign_keys(self.executor.as_ref(), &self.config.database, table)
            .await
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.driver.name())
            .field("name", &self.config.name)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

type SharedDriver = Arc<dyn Driver>;

fn registry() -> &'static Registry<SharedDriver> {
    static REGISTRY: OnceLock<Registry<SharedDriver>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::new("sql-driver");
        let _ = registry.register(crate::mysql::NAME, || Arc::new(MySqlDriver) as SharedDriver);
        registry
    })
}

/// Registers a driver under `name`.
pub fn register_driver<F>(name: impl Into<String>, factory: F) -> DatabaseResult<()>
where
    F: Fn() -> SharedDriver + Send + Sync + 'static,
{
    registry().register(name, factory)?;
    Ok(())
}

/// Looks up the driver registered as `name`.
pub fn driver(name: &str) -> DatabaseResult<SharedDriver> {
    Ok(registry().get(name)?)
}

/// Names of all registered drivers, sorted.
pub fn drivers() -> Vec<String> {
    registry().names()
}

/// Opens `config` with its driver on top of `executor`.
pub fn open(config: DatabaseConfig, executor: Arc<dyn Executor>) -> DatabaseResult<Database> {
    let driver = resolve(&config)?;

    let database = Database {
        driver,
        config,
        executor,
    };
    info!(
        name = %database.config.name,
        driver = database.driver.name(),
        max_open_conns = database.max_open_conns(),
        "database opened"
    );
    Ok(database)
}

/// The validated driver for `config`.
pub(crate) fn resolve(config: &DatabaseConfig) -> DatabaseResult<SharedDriver> {
    if config.driver.is_empty() {
        return Err(DatabaseError::InvalidConfig {
            name: config.name.clone(),
            reason: "driver is not set".to_string(),
        });
    }
    let driver = driver(&config.driver)?;
    driver.validate(config)?;
    Ok(driver)
}
