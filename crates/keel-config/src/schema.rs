//! Application configuration schema.
//!
//! ```json
//! {
//!   "server":    { "httpPort": 8080, "appPath": "/srv/app" },
//!   "router":    { "provider": "radix", "favicon": "static/fav.ico",
//!                  "directories": [{ "url": "/assets", "source": "static" }] },
//!   "caches":    [{ "provider": "memory", "cycle": 5 }],
//!   "databases": [{ "name": "main", "driver": "mysql", "host": "db",
//!                   "port": 3306, "user": "app", "database": "shop" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reader::ParseOptions;
use crate::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Database connection descriptors.
    pub databases: Vec<DatabaseConfig>,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Router backend and static assets.
    pub router: RouterConfig,
    /// Cache backends to bring up.
    pub caches: Vec<CacheConfig>,
    /// Log output settings.
    pub logging: Option<LoggingConfig>,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Listen port. Required.
    pub http_port: u16,
    /// Base application path. Required.
    pub app_path: String,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 0,
            app_path: String::new(),
            shutdown_timeout_secs: None,
        }
    }
}

/// Router backend selection and static assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Name registered in the router registry.
    pub provider: String,
    /// Favicon file served at `/favicon.ico`.
    pub favicon: Option<PathBuf>,
    /// Static directories.
    pub directories: Vec<DirectoryConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            provider: "radix".to_string(),
            favicon: None,
            directories: Vec::new(),
        }
    }
}

/// A static directory mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// URL prefix, e.g. `/assets`.
    pub url: String,
    /// Filesystem directory served under the prefix.
    pub source: PathBuf,
}

/// A cache backend to instantiate at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name registered in the cache registry.
    pub provider: String,
    /// Sweep interval in minutes.
    #[serde(default)]
    pub cycle: Option<u64>,
}

impl CacheConfig {
    /// Sweep interval as a duration.
    pub fn cycle_duration(&self) -> Option<Duration> {
        self.cycle.map(|minutes| Duration::from_secs(minutes * 60))
    }
}

/// A database connection descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// Logical connection name.
    pub name: String,
    /// Name registered in the SQL driver registry.
    pub driver: String,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Default schema.
    pub database: String,
    /// Upper bound on pooled connections; drivers pick a default when unset.
    pub max_open_conns: Option<u32>,
    /// Extra driver parameters.
    pub params: BTreeMap<String, String>,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `keel=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Reads, decodes and validates the file at `path`.
    ///
    /// `.toml` files go through the `toml` reader, everything else through
    /// `json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let reader = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => "toml",
            _ => "json",
        };
        Self::parse_with(reader, &ParseOptions::new(path))
    }

    /// Decodes through `reader` with explicit options, then validates.
    pub fn parse_with(reader: &str, options: &ParseOptions) -> Result<Self, ConfigError> {
        let config: Self = crate::parse(reader, options)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the required keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_port == 0 {
            return Err(ConfigError::missing_field("server.httpPort"));
        }
        if self.server.app_path.is_empty() {
            return Err(ConfigError::missing_field("server.appPath"));
        }
        for (i, cache) in self.caches.iter().enumerate() {
            if cache.provider.is_empty() {
                continue;
            }
            match cache.cycle {
                None => return Err(ConfigError::missing_field(format!("caches[{i}].cycle"))),
                Some(0) => {
                    return Err(ConfigError::invalid_value(
                        format!("caches[{i}].cycle"),
                        "must be greater than zero",
                    ))
                }
                Some(_) => {}
            }
        }
        for (i, dir) in self.router.directories.iter().enumerate() {
            if !dir.url.starts_with('/') {
                return Err(ConfigError::invalid_value(
                    format!("router.directories[{i}].url"),
                    "must start with '/'",
                ));
            }
        }
        Ok(())
    }
}
