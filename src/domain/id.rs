//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for lease and resource identifiers so the two are never
//! mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from an existing string
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

domain_id!(
    /// Lease identifier of the form `<secret path>/<uuid>`.
    ///
    /// The path prefix lets operators list or revoke every lease issued under
    /// a given path.
    LeaseId
);

domain_id!(
    /// Identifier of an external resource guarded by a lease (an upstream
    /// account, a stored key record).
    ResourceId
);

impl LeaseId {
    /// Generate a fresh lease id under `path`
    pub fn generate(path: &str) -> Self {
        let path = path.trim_matches('/');
        if path.is_empty() {
            Self(Uuid::new_v4().to_string())
        } else {
            Self(format!("{}/{}", path, Uuid::new_v4()))
        }
    }

    /// Whether this lease id lives under `prefix`
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches('/');
        prefix.is_empty()
            || self.0 == prefix
            || (self.0.starts_with(prefix) && self.0[prefix.len()..].starts_with('/'))
    }
}

impl ResourceId {
    /// Generate a fresh random resource id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
