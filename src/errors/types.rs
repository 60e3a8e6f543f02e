//! # Backend Error Types
//!
//! Request-level error taxonomy for the secrets backend using `thiserror`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Operation;

/// Result type for request-level backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Stable, machine-readable error codes carried on error responses and warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidTtl,
    NotFound,
    AlreadyRevoked,
    TtlExceedsMax,
    PatternConflict,
    NoRoute,
    MethodNotAllowed,
    MalformedRequest,
    RevocationFailed,
    UpstreamTimeout,
    NotRenewable,
    LeaseExpired,
    InvalidParameter,
    UpstreamFailed,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidTtl => "invalid_ttl",
            ErrorCode::NotFound => "not_found",
            ErrorCode::AlreadyRevoked => "already_revoked",
            ErrorCode::TtlExceedsMax => "ttl_exceeds_max",
            ErrorCode::PatternConflict => "pattern_conflict",
            ErrorCode::NoRoute => "no_route",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::MalformedRequest => "malformed_request",
            ErrorCode::RevocationFailed => "revocation_failed",
            ErrorCode::UpstreamTimeout => "upstream_timeout",
            ErrorCode::NotRenewable => "not_renewable",
            ErrorCode::LeaseExpired => "lease_expired",
            ErrorCode::InvalidParameter => "invalid_parameter",
            ErrorCode::UpstreamFailed => "upstream_failed",
            ErrorCode::Internal => "internal",
        }
    }

    /// HTTP status the transport adapter reports for this code
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidTtl
            | ErrorCode::MalformedRequest
            | ErrorCode::InvalidParameter
            | ErrorCode::NotRenewable
            | ErrorCode::TtlExceedsMax => 400,
            ErrorCode::NotFound | ErrorCode::NoRoute => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::AlreadyRevoked | ErrorCode::LeaseExpired | ErrorCode::PatternConflict => {
                409
            }
            ErrorCode::UpstreamFailed | ErrorCode::RevocationFailed => 502,
            ErrorCode::UpstreamTimeout => 504,
            ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level errors raised by the lease store, router, handlers, and dispatcher
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Requested TTL is zero or larger than the maximum TTL
    #[error("Invalid TTL: {message}")]
    InvalidTtl { message: String },

    /// Resource not found
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Lease was revoked and cannot be renewed
    #[error("Lease '{lease_id}' has already been revoked")]
    AlreadyRevoked { lease_id: String },

    /// Lease was issued as non-renewable
    #[error("Lease '{lease_id}' is not renewable")]
    NotRenewable { lease_id: String },

    /// Lease expiry has passed
    #[error("Lease '{lease_id}' has expired")]
    LeaseExpired { lease_id: String },

    /// Same (pattern, operation) registered twice
    #[error("Route conflict: '{pattern}' is already registered for {operation}")]
    PatternConflict { pattern: String, operation: Operation },

    /// No registered pattern matches the path
    #[error("No route matches path '{path}'")]
    NoRoute { path: String },

    /// Path matched but not for the requested operation
    #[error("Operation {operation} is not allowed on '{path}'")]
    MethodNotAllowed { path: String, operation: Operation, allowed: Vec<Operation> },

    /// Request shape violated the schema
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    /// A request parameter had the wrong type or value
    #[error("Invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    /// External teardown failed; the lease stays active so revocation can be retried
    #[error("Revocation of lease '{lease_id}' failed: {reason}")]
    RevocationFailed { lease_id: String, reason: String },

    /// External provisioning call exceeded its bound
    #[error("Upstream operation timed out: {operation} after {duration_ms}ms")]
    UpstreamTimeout { operation: String, duration_ms: u64 },

    /// External provisioning call failed
    #[error("Upstream operation failed: {message}")]
    UpstreamFailed { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BackendError {
    pub fn invalid_ttl<S: Into<String>>(message: S) -> Self {
        Self::InvalidTtl { message: message.into() }
    }

    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn already_revoked<S: Into<String>>(lease_id: S) -> Self {
        Self::AlreadyRevoked { lease_id: lease_id.into() }
    }

    pub fn not_renewable<S: Into<String>>(lease_id: S) -> Self {
        Self::NotRenewable { lease_id: lease_id.into() }
    }

    pub fn lease_expired<S: Into<String>>(lease_id: S) -> Self {
        Self::LeaseExpired { lease_id: lease_id.into() }
    }

    pub fn pattern_conflict<S: Into<String>>(pattern: S, operation: Operation) -> Self {
        Self::PatternConflict { pattern: pattern.into(), operation }
    }

    pub fn no_route<S: Into<String>>(path: S) -> Self {
        Self::NoRoute { path: path.into() }
    }

    pub fn method_not_allowed<S: Into<String>>(
        path: S,
        operation: Operation,
        allowed: Vec<Operation>,
    ) -> Self {
        Self::MethodNotAllowed { path: path.into(), operation, allowed }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedRequest { message: message.into() }
    }

    pub fn invalid_parameter<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidParameter { field: field.into(), message: message.into() }
    }

    pub fn revocation_failed<L: Into<String>, R: Into<String>>(lease_id: L, reason: R) -> Self {
        Self::RevocationFailed { lease_id: lease_id.into(), reason: reason.into() }
    }

    pub fn upstream_timeout<S: Into<String>>(operation: S, limit: Duration) -> Self {
        Self::UpstreamTimeout {
            operation: operation.into(),
            duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn upstream_failed<S: Into<String>>(message: S) -> Self {
        Self::UpstreamFailed { message: message.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// The stable code reported to clients
    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::InvalidTtl { .. } => ErrorCode::InvalidTtl,
            BackendError::NotFound { .. } => ErrorCode::NotFound,
            BackendError::AlreadyRevoked { .. } => ErrorCode::AlreadyRevoked,
            BackendError::NotRenewable { .. } => ErrorCode::NotRenewable,
            BackendError::LeaseExpired { .. } => ErrorCode::LeaseExpired,
            BackendError::PatternConflict { .. } => ErrorCode::PatternConflict,
            BackendError::NoRoute { .. } => ErrorCode::NoRoute,
            BackendError::MethodNotAllowed { .. } => ErrorCode::MethodNotAllowed,
            BackendError::MalformedRequest { .. } => ErrorCode::MalformedRequest,
            BackendError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            BackendError::RevocationFailed { .. } => ErrorCode::RevocationFailed,
            BackendError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            BackendError::UpstreamFailed { .. } => ErrorCode::UpstreamFailed,
            BackendError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Check if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RevocationFailed { .. }
                | BackendError::UpstreamTimeout { .. }
                | BackendError::UpstreamFailed { .. }
        )
    }
}
