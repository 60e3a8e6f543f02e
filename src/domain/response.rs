use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lease::Lease;
use crate::errors::{BackendError, ErrorCode};

/// Non-fatal caveat attached to a response ("succeeded, but ...")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: ErrorCode,
    pub message: String,
}

impl Warning {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self { code, message: message.into() }
    }
}

/// Hard failure carried on an error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl From<&BackendError> for ErrorBody {
    fn from(err: &BackendError) -> Self {
        Self { code: err.code(), message: err.to_string(), retryable: err.is_retryable() }
    }
}

/// Backend response returned across the transport boundary.
///
/// Warnings are carried on every response, success or error, so clients can
/// tell "succeeded with caveat" apart from "failed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Map<String, Value>) -> Self {
        Self { data, ..Self::default() }
    }

    pub fn lease(mut self, lease: Lease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn insert<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Build an error response, keeping warnings accumulated before the failure
    pub fn from_error(err: &BackendError, warnings: Vec<Warning>) -> Self {
        Self { error: Some(ErrorBody::from(err)), warnings, ..Self::default() }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
