//! Reader registry and the `parse` entry point.

use std::env;
use std::sync::OnceLock;

use keel_core::Registry;
use serde::de::DeserializeOwned;

use crate::reader::{ConfigReader, FileReader, Format, ParseOptions};
use crate::ConfigError;

/// Process environment variable holding the default environment tag.
pub const ENV_VAR: &str = "ENV";

type BoxedReader = Box<dyn ConfigReader>;

fn readers() -> &'static Registry<BoxedReader> {
    static READERS: OnceLock<Registry<BoxedReader>> = OnceLock::new();
    READERS.get_or_init(|| {
        let registry = Registry::new("config-reader");
        let _ = registry.register("json", || Box::new(FileReader::new(Format::Json)) as BoxedReader);
        let _ = registry.register("toml", || Box::new(FileReader::new(Format::Toml)) as BoxedReader);
        registry
    })
}

/// Registers a configuration reader under `name`.
pub fn register_reader<F>(name: &str, factory: F) -> Result<(), ConfigError>
where
    F: Fn() -> BoxedReader + Send + Sync + 'static,
{
    readers().register(name, factory)?;
    Ok(())
}

/// Names of the registered readers.
pub fn reader_names() -> Vec<String> {
    readers().names()
}

/// Decodes a `T` through the reader registered as `reader`.
///
/// The reader's environment tag is `options.env` if given, otherwise the
/// `ENV` process variable (after loading `.env` when `options.dotenv` is set).
pub fn parse<T: DeserializeOwned>(reader: &str, options: &ParseOptions) -> Result<T, ConfigError> {
    if reader.is_empty() {
        return Err(ConfigError::NoReader);
    }
    let mut instance = readers().get(reader)?;

    if options.dotenv {
        load_dotenv(options)?;
    }
    let env_tag = match &options.env {
        Some(tag) => tag.clone(),
        None => env::var(ENV_VAR).unwrap_or_default(),
    };
    instance.set_env(&env_tag);

    tracing::debug!(reader, path = %options.path.display(), env = %env_tag, "parsing configuration");
    let document = instance.read(options)?;
    Ok(serde_json::from_value(document)?)
}

fn load_dotenv(options: &ParseOptions) -> Result<(), ConfigError> {
    let dir = options
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| std::path::PathBuf::from("."), std::path::Path::to_path_buf);
    let path = dir.join(".env");
    if !path.exists() {
        return Ok(());
    }
    dotenvy::from_path(&path).map_err(|e| ConfigError::DotenvError {
        path: path.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    struct StaticReader {
        env: String,
    }

    impl ConfigReader for StaticReader {
        fn set_env(&mut self, env: &str) {
            self.env = env.to_string();
        }

        fn env(&self) -> &str {
            &self.env
        }

        fn read(&self, _options: &ParseOptions) -> Result<Value, ConfigError> {
            Ok(serde_json::json!({ "env": self.env }))
        }
    }

    #[derive(Deserialize)]
    struct EnvOnly {
        env: String,
    }

    #[test]
    fn test_builtin_readers() {
        let names = reader_names();
        assert!(names.contains(&"json".to_string()));
        assert!(names.contains(&"toml".to_string()));
    }

    #[test]
    fn test_no_reader() {
        let err = parse::<Value>("", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoReader));
    }

    #[test]
    fn test_unknown_reader() {
        let err = parse::<Value>("yaml", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ReaderNotExist(ref n) if n == "yaml"));
    }

    #[test]
    fn test_duplicate_reader() {
        let err = register_reader("json", || Box::new(FileReader::new(Format::Json))).unwrap_err();
        assert!(matches!(err, ConfigError::ReaderAlreadyExists(ref n) if n == "json"));
    }

    #[test]
    fn test_explicit_env_reaches_reader() {
        register_reader("static-test", || {
            Box::new(StaticReader { env: String::new() })
        })
        .unwrap();

        let parsed: EnvOnly =
            parse("static-test", &ParseOptions::default().with_env("qa")).unwrap();
        assert_eq!(parsed.env, "qa");
    }
}
