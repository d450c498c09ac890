//! Per-route configuration.
//!
//! A route binds HTTP methods to named controller operations with a compact
//! mapping string:
//!
//! ```text
//! get:Get,post:Create,delete:Remove
//! ```
//!
//! Method names are case-insensitive and limited to `get`, `post`, `put`,
//! `patch`, `delete`, `options` and `head`.

use std::fmt;

use http::Method;
use keel_middleware::ParamChain;

use crate::error::ControllerError;

const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// Configuration for one controller route.
///
/// # Example
///
/// ```rust
/// use keel_controller::RouteConfig;
/// use http::Method;
///
/// let config = RouteConfig::new("get:Get, POST:Create");
/// let bindings = config.bindings().unwrap();
///
/// assert_eq!(bindings[0], (Method::GET, "Get".to_string()));
/// assert_eq!(bindings[1], (Method::POST, "Create".to_string()));
/// ```
#[derive(Clone, Default)]
pub struct RouteConfig {
    /// `method:Operation` pairs separated by commas.
    pub http_method_to_func: String,
    /// Middleware wrapped around every handler of the route.
    pub middleware: Option<ParamChain>,
    /// Lets the route bind operations that are already bound to another
    /// pattern of the same controller.
    pub allow_http_method_override: bool,
}

impl RouteConfig {
    /// Creates a config from a method mapping.
    pub fn new(http_method_to_func: impl Into<String>) -> Self {
        Self {
            http_method_to_func: http_method_to_func.into(),
            ..Self::default()
        }
    }

    /// Sets the route middleware.
    pub fn with_middleware(mut self, chain: ParamChain) -> Self {
        self.middleware = Some(chain);
        self
    }

    /// Allows operations to be shared with other patterns.
    pub fn allow_override(mut self) -> Self {
        self.allow_http_method_override = true;
        self
    }

    /// Parses the method mapping into `(method, operation)` pairs, in
    /// declaration order.
    pub fn bindings(&self) -> Result<Vec<(Method, String)>, ControllerError> {
        parse_bindings(&self.http_method_to_func)
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("http_method_to_func", &self.http_method_to_func)
            .field("middleware", &self.middleware)
            .field("allow_http_method_override", &self.allow_http_method_override)
            .finish()
    }
}

/// Parses `method:Operation[,method:Operation]*`.
pub fn parse_bindings(mapping: &str) -> Result<Vec<(Method, String)>, ControllerError> {
    let malformed = || ControllerError::MalformedMapping(mapping.to_string());

    let mut bindings: Vec<(Method, String)> = Vec::new();
    for pair in mapping.split(',') {
        let (method, operation) = pair.split_once(':').ok_or_else(malformed)?;
        let (method, operation) = (method.trim(), operation.trim());
        if method.is_empty() || operation.is_empty() {
            return Err(malformed());
        }

        let method = SUPPORTED_METHODS
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(method))
            .cloned()
            .ok_or_else(|| ControllerError::UnsupportedMethod(method.to_string()))?;

        match bindings.iter_mut().find(|(m, _)| *m == method) {
            Some(existing) => existing.1 = operation.to_string(),
            None => bindings.push((method, operation.to_string())),
        }
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_binding() {
        let bindings = parse_bindings("get:Get").unwrap();
        assert_eq!(bindings, vec![(Method::GET, "Get".to_string())]);
    }

    #[test]
    fn test_methods_are_case_insensitive() {
        let bindings = parse_bindings("GeT:Show,DELETE:Remove,options:Probe").unwrap();
        let methods: Vec<_> = bindings.iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(methods, vec![Method::GET, Method::DELETE, Method::OPTIONS]);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let bindings = parse_bindings(" get : Get , post:Post ").unwrap();
        assert_eq!(bindings[1], (Method::POST, "Post".to_string()));
    }

    #[test]
    fn test_later_binding_for_same_method_wins() {
        let bindings = parse_bindings("get:Old,get:New").unwrap();
        assert_eq!(bindings, vec![(Method::GET, "New".to_string())]);
    }

    #[test]
    fn test_unsupported_method() {
        assert_eq!(
            parse_bindings("get:Get,trace:Trace"),
            Err(ControllerError::UnsupportedMethod("trace".to_string()))
        );
    }

    #[test]
    fn test_malformed_mapping() {
        for mapping in ["", "get", "get:", ":Get", "get:Get,,post:Post"] {
            assert!(
                matches!(parse_bindings(mapping), Err(ControllerError::MalformedMapping(_))),
                "{mapping:?} should be rejected"
            );
        }
    }
}
