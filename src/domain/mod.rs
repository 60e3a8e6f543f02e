//! Domain layer
//!
//! Pure data types shared by every layer of the backend: requests and
//! responses crossing the transport boundary, leases, secret payloads, and
//! credential roles. Nothing in here performs I/O.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe lease and resource identifiers
//! - `operation`: Request verbs
//! - `request` / `response`: The dispatch contract
//! - `lease`: Lease records and secret references
//! - `secret`: Redacting secret payload types
//! - `role`: Credential role templates
//! - `duration`: TTL parsing and serialization

pub mod duration;
pub mod id;
pub mod lease;
pub mod operation;
pub mod request;
pub mod response;
pub mod role;
pub mod secret;

pub use id::{LeaseId, ResourceId};
pub use lease::{Lease, LeaseState, SecretRef, SecretType};
pub use operation::Operation;
pub use request::Request;
pub use response::{ErrorBody, Response, Warning};
pub use role::Role;
pub use secret::{Secret, SecretString, SecretValue};
