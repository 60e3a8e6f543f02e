//! Backend request model and shape validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::duration::parse_ttl;
use super::operation::Operation;
use crate::errors::{BackendError, BackendResult};

/// A decoded request from the transport boundary.
///
/// Fields are private: once a request has been built or parsed it is never
/// modified, so every layer below the dispatcher sees the same values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    operation: Operation,
    path: String,
    parameters: Map<String, Value>,
}

/// Wire shape before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequest {
    operation: String,
    path: String,
    #[serde(default)]
    parameters: Option<Value>,
}

impl Request {
    /// Build a request in code (tests, internal callers such as the sweep)
    pub fn new<P: Into<String>>(operation: Operation, path: P) -> BackendResult<Self> {
        let path = normalize_path(&path.into())?;
        Ok(Self { operation, path, parameters: Map::new() })
    }

    /// Add a parameter while building a request
    pub fn with_parameter<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Validate a raw JSON value against the request schema
    pub fn from_value(raw: Value) -> BackendResult<Self> {
        if !raw.is_object() {
            return Err(BackendError::malformed("request must be a JSON object"));
        }
        let raw: RawRequest =
            serde_json::from_value(raw).map_err(|e| BackendError::malformed(e.to_string()))?;

        let operation = raw.operation.parse::<Operation>().map_err(BackendError::malformed)?;
        let path = normalize_path(&raw.path)?;
        let parameters = match raw.parameters {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(BackendError::malformed("parameters must be a JSON object")),
        };

        Ok(Self { operation, path, parameters })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Normalized path without leading or trailing slashes
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|v| !v.is_null())
    }

    /// Optional string parameter; wrong types are rejected
    pub fn str_param(&self, name: &str) -> BackendResult<Option<&str>> {
        match self.param(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(BackendError::invalid_parameter(name, "must be a string")),
        }
    }

    /// Optional boolean parameter; accepts JSON booleans and "true"/"false" strings
    pub fn bool_param(&self, name: &str) -> BackendResult<Option<bool>> {
        match self.param(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(_) => Err(BackendError::invalid_parameter(name, "must be a boolean")),
        }
    }

    /// Optional TTL parameter
    pub fn duration_param(&self, name: &str) -> BackendResult<Option<Duration>> {
        self.param(name).map(|v| parse_ttl(name, v)).transpose()
    }
}

/// Trim slashes and reject empty, relative, or doubled segments
fn normalize_path(raw: &str) -> BackendResult<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(BackendError::malformed("path must not be empty"));
    }
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(BackendError::malformed(format!("path '{}' has an empty segment", raw))),
            "." | ".." => {
                return Err(BackendError::malformed(format!(
                    "path '{}' contains a relative segment",
                    raw
                )))
            }
            s if s.chars().any(char::is_control) => {
                return Err(BackendError::malformed("path contains control characters"))
            }
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}
