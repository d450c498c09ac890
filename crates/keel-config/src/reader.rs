//! Configuration readers.
//!
//! A reader turns a configuration source into a JSON document. The built-in
//! readers load a file and, when an environment tag is set, deep-merge the
//! sibling `<stem>.<env>.<ext>` file over it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::ConfigError;

/// Options passed to [`parse`](crate::parse).
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Base configuration file.
    pub path: PathBuf,
    /// Environment tag; `ENV` is consulted when unset.
    pub env: Option<String>,
    /// Load a `.env` file next to `path` before consulting `ENV`.
    pub dotenv: bool,
}

impl ParseOptions {
    /// Options for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Overrides the environment tag.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Enables `.env` loading.
    #[must_use]
    pub fn with_dotenv(mut self) -> Self {
        self.dotenv = true;
        self
    }
}

/// Decodes a configuration source into a JSON document.
pub trait ConfigReader: Send + Sync {
    /// Sets the environment tag used to pick overlays.
    fn set_env(&mut self, env: &str);

    /// The current environment tag.
    fn env(&self) -> &str;

    /// Reads the configuration described by `options`.
    fn read(&self, options: &ParseOptions) -> Result<serde_json::Value, ConfigError>;
}

/// File format understood by [`FileReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON documents
    Json,
    /// TOML documents
    Toml,
}

impl Format {
    fn parse(self, content: &str) -> Result<Value, ConfigError> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
        })
    }
}

/// Reads a JSON or TOML file plus its environment overlay.
#[derive(Debug, Clone)]
pub struct FileReader {
    format: Format,
    env: String,
}

impl FileReader {
    /// Creates a reader for `format`.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            env: String::new(),
        }
    }

    fn load(&self, path: &Path) -> Result<Value, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.format.parse(&content)
    }
}

impl ConfigReader for FileReader {
    fn set_env(&mut self, env: &str) {
        self.env = env.to_string();
    }

    fn env(&self) -> &str {
        &self.env
    }

    fn read(&self, options: &ParseOptions) -> Result<Value, ConfigError> {
        let mut document = self.load(&options.path)?;

        if let Some(overlay_path) = overlay_path(&options.path, &self.env) {
            if overlay_path.exists() {
                tracing::debug!(path = %overlay_path.display(), env = %self.env, "applying config overlay");
                let overlay = self.load(&overlay_path)?;
                merge(&mut document, overlay);
            }
        }

        Ok(document)
    }
}

/// `config.json` + `prod` gives `config.prod.json`.
pub(crate) fn overlay_path(base: &Path, env: &str) -> Option<PathBuf> {
    if env.is_empty() {
        return None;
    }
    let stem = base.file_stem()?.to_str()?;
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{env}.{ext}"),
        None => format!("{stem}.{env}"),
    };
    Some(base.with_file_name(name))
}

/// Deep-merges `overlay` into `base`. Objects merge key by key, anything
/// else is replaced.
pub(crate) fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_maps(base, overlay),
        (base, overlay) => *base = overlay,
    }
}

fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
