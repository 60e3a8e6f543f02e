//! # Vaultplane
//!
//! A pluggable secrets-engine backend. A host process sends operation
//! requests (`create`, `read`, `update`, `delete`, `renew`, `revoke` on a
//! path) over a private channel; the backend routes them to a secret handler
//! and tracks every issued secret as a lease with a TTL, a maximum TTL, and a
//! terminal revoked state.
//!
//! ## Architecture
//!
//! ```text
//! transport → Backend (dispatcher) → Router → SecretHandler → LeaseStore
//!                                                  ↓
//!                                     Storage / CredentialUpstream
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultplane::backend::{channel, serve, Backend};
//!
//! #[tokio::main]
//! async fn main() -> vaultplane::Result<()> {
//!     let backend = Arc::new(Backend::builder().build()?);
//!     let (client, rx) = channel(64);
//!     tokio::spawn(serve(backend, rx));
//!
//!     let response = client
//!         .call(serde_json::json!({ "operation": "create", "path": "roles/dev" }))
//!         .await?;
//!     assert!(!response.is_error());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod lease;
pub mod observability;
pub mod router;
pub mod storage;
pub mod transport;
pub mod upstream;

// Re-export commonly used types and traits
pub use backend::{Backend, BackendClient, SweepReport};
pub use config::Config;
pub use domain::{Lease, Operation, Request, Response};
pub use errors::{BackendError, ErrorCode, Error, Result};
pub use lease::LeaseStore;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "vaultplane");
    }
}
