//! # Keel Config
//!
//! Configuration for Keel applications.
//!
//! - [`parse`] decodes any `serde` type through a named [`ConfigReader`]
//!   (`json` and `toml` are built in), honouring the `ENV` environment tag
//!   and `<stem>.<env>.<ext>` overlays.
//! - [`is_set`] checks dotted-path presence over nested records.
//! - [`AppConfig`] is the typed schema consumed by the server bootstrap.
//!
//! ```no_run
//! use keel_config::AppConfig;
//!
//! # fn main() -> Result<(), keel_config::ConfigError> {
//! let config = AppConfig::from_file("config.json")?;
//! println!("listening on {}", config.server.http_port);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/keel-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod is_set;
mod parse;
mod reader;
mod schema;

pub use error::ConfigError;
pub use is_set::is_set;
pub use parse::{parse, reader_names, register_reader, ENV_VAR};
pub use reader::{ConfigReader, FileReader, Format, ParseOptions};
pub use schema::{
    AppConfig, CacheConfig, DatabaseConfig, DirectoryConfig, LoggingConfig, RouterConfig,
    ServerConfig,
};
