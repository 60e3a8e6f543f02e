//! # Storage
//!
//! The backend's own key/value storage: role definitions, static kv secrets,
//! and signing key records. [`Storage`] is the seam a persistent store would
//! plug into; [`MemoryStorage`] is the implementation the binary ships with.

pub mod memory;
pub mod roles;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::BackendResult;

pub use memory::MemoryStorage;
pub use roles::RoleRepository;

/// Key prefix for role definitions
pub const ROLE_PREFIX: &str = "role/";
/// Key prefix for static secrets
pub const KV_PREFIX: &str = "kv/";
/// Key prefix for signing key records
pub const KEY_PREFIX: &str = "keys/";

/// Plain key/value storage with ordered prefix listing
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> BackendResult<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> BackendResult<()>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> BackendResult<bool>;

    /// Keys directly or transitively under `prefix`, in order, with the
    /// prefix stripped
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>>;
}
