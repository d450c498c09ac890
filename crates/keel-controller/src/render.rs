//! Response renderers.
//!
//! A renderer turns the data accumulated in a [`ResponseContext`] into body
//! bytes. `json` and `text` are built in; more can be registered by name with
//! [`register_renderer`].

use std::sync::{Arc, OnceLock};

use http::header::{self, HeaderValue};
use keel_core::Registry;
use serde_json::Value;

use crate::context::ResponseContext;
use crate::error::RenderError;

/// Render type of the JSON renderer, the default for controllers.
pub const JSON: &str = "json";

/// Render type of the plain-text renderer.
pub const TEXT: &str = "text";

/// Turns response data into a body.
pub trait Renderer: Send + Sync + 'static {
    /// Appends the rendered data to `response`'s body.
    fn render(&self, response: &mut ResponseContext) -> Result<(), RenderError>;
}

/// Writes the data as one JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, response: &mut ResponseContext) -> Result<(), RenderError> {
        let body = serde_json::to_vec(response.data())?;
        response.default_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.write(&body);
        Ok(())
    }
}

/// Writes one `key: value` line per data entry.
///
/// String values are written bare, everything else as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, response: &mut ResponseContext) -> Result<(), RenderError> {
        let mut body = String::new();
        for (key, value) in response.data() {
            body.push_str(key);
            body.push_str(": ");
            match value {
                Value::String(s) => body.push_str(s),
                other => body.push_str(&other.to_string()),
            }
            body.push('\n');
        }
        response.default_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.write(body.as_bytes());
        Ok(())
    }
}

type SharedRenderer = Arc<dyn Renderer>;

fn registry() -> &'static Registry<SharedRenderer> {
    static REGISTRY: OnceLock<Registry<SharedRenderer>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::new("renderer");
        let _ = registry.register(JSON, || Arc::new(JsonRenderer) as SharedRenderer);
        let _ = registry.register(TEXT, || Arc::new(TextRenderer) as SharedRenderer);
        registry
    })
}

/// Registers a renderer under `name`.
pub fn register_renderer<F>(name: impl Into<String>, factory: F) -> Result<(), RenderError>
where
    F: Fn() -> SharedRenderer + Send + Sync + 'static,
{
    registry().register(name, factory)?;
    Ok(())
}

/// Looks up the renderer registered as `name`.
pub fn renderer(name: &str) -> Result<SharedRenderer, RenderError> {
    registry()
        .get(name)
        .map_err(|_| RenderError::UnknownRenderer(name.to_string()))
}

/// Names of all registered renderers, sorted.
pub fn renderer_names() -> Vec<String> {
    registry().names()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_renders_object_in_insertion_order() {
        let mut response = ResponseContext::new();
        response.set("z", "last-key-first");
        response.set("a", 1);
        JsonRenderer.render(&mut response).unwrap();

        assert_eq!(response.body(), br#"{"z":"last-key-first","a":1}"#);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_json_renders_empty_object() {
        let mut response = ResponseContext::new();
        JsonRenderer.render(&mut response).unwrap();
        assert_eq!(response.body(), b"{}");
    }

    #[test]
    fn test_text_renders_lines() {
        let mut response = ResponseContext::new();
        response.set("name", "keel");
        response.set("count", 2);
        TextRenderer.render(&mut response).unwrap();
        assert_eq!(response.body(), b"name: keel\ncount: 2\n");
    }

    #[test]
    fn test_text_appends_after_error_body() {
        let mut response = ResponseContext::new();
        response.text_error(http::StatusCode::INTERNAL_SERVER_ERROR, "m");
        TextRenderer.render(&mut response).unwrap();
        assert_eq!(response.body(), b"m\n");
    }

    #[test]
    fn test_builtin_renderers_registered() {
        let names = renderer_names();
        assert!(names.contains(&JSON.to_string()));
        assert!(names.contains(&TEXT.to_string()));
    }

    #[test]
    fn test_unknown_renderer() {
        assert!(matches!(
            renderer("yaml-nope"),
            Err(RenderError::UnknownRenderer(name)) if name == "yaml-nope"
        ));
    }

    struct Upper;

    impl Renderer for Upper {
        fn render(&self, response: &mut ResponseContext) -> Result<(), RenderError> {
            let text: String = response
                .data()
                .values()
                .filter_map(Value::as_str)
                .map(str::to_uppercase)
                .collect();
            response.write(text.as_bytes());
            Ok(())
        }
    }

    #[test]
    fn test_custom_renderer() {
        register_renderer("upper-test", || Arc::new(Upper) as SharedRenderer).unwrap();
        assert!(register_renderer("upper-test", || Arc::new(Upper) as SharedRenderer).is_err());

        let mut response = ResponseContext::new();
        response.set("k", "abc");
        response.render("upper-test").unwrap();
        assert_eq!(response.body(), b"ABC");
    }
}
