//! # Keel SQL
//!
//! Database drivers and schema introspection.
//!
//! Drivers register by name; [`open`] binds a [`DatabaseConfig`] to its
//! driver and an application-provided [`Executor`]. [`Database::describe`]
//! returns the table's columns with a normalized [`ColumnType`] each.
//!
//! With the default `mysql-pool` feature, [`connect`] opens a MySQL config on
//! an `sqlx` pool bounded by [`Database::max_open_conns`].
//!
//! # Example
//!
//! ```rust
//! use keel_sql::{driver, Column, ColumnType};
//!
//! let mysql = driver("mysql").unwrap();
//! let column = Column::new("id", "int unsigned");
//! assert_eq!(
//!     mysql.type_mapping("int unsigned", &column),
//!     Some(ColumnType::Integer { min: 0, max: 4_294_967_295 })
//! );
//! ```
//!
//! [`DatabaseConfig`]: keel_config::DatabaseConfig

#![doc(html_root_url = "https://docs.rs/keel-sql/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod driver;
mod error;
pub mod mysql;
#[cfg(feature = "mysql-pool")]
mod pool;
mod row;
mod schema;

pub use driver::{driver, drivers, open, register_driver, Database, Driver};
pub use error::{DatabaseError, DatabaseResult};
pub use mysql::MySqlDriver;
#[cfg(feature = "mysql-pool")]
pub use pool::{connect, connect_lazy, MySqlExecutor};
pub use row::{Executor, Row};
pub use schema::{Column, ColumnType, ForeignKey, KeyColumn, Placeholder};
