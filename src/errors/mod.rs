//! # Error Handling
//!
//! Two layers of errors live here:
//!
//! - [`Error`]: process-level failures (configuration, transport, I/O) that
//!   can stop the binary.
//! - [`BackendError`]: the request-level taxonomy. Every `BackendError` is
//!   converted into an error [`Response`](crate::domain::Response) by the
//!   dispatcher and never escapes the transport boundary.

pub mod types;

pub use types::{BackendError, BackendResult, ErrorCode};

/// Custom result type for process-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vaultplane process
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend failed to initialize (e.g. conflicting routes)
    #[error("Backend initialization failed: {0}")]
    Backend(#[from] BackendError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(format!("Configuration loading failed: {}", error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Config(format!("Validation failed: {}", message))
    }
}
