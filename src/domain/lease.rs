//! Lease records and the secret references they guard.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::duration::seconds;
use super::id::{LeaseId, ResourceId};

/// Closed set of secret types served by this backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    /// Static key/value secrets
    Kv,
    /// Ed25519 signing key pairs
    SigningKey,
    /// Dynamic credentials provisioned by an upstream system
    Credential,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kv => "kv",
            Self::SigningKey => "signing_key",
            Self::Credential => "credential",
        }
    }
}

impl FromStr for SecretType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kv" => Ok(Self::Kv),
            "signing_key" => Ok(Self::SigningKey),
            "credential" => Ok(Self::Credential),
            _ => Err(format!("Unknown secret type: {}", s)),
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a lease guards: the owning secret type, the request path that
/// produced it, and the external resource to tear down on revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub secret_type: SecretType,
    pub path: String,
    pub resource_id: ResourceId,
}

impl SecretRef {
    pub fn new<P: Into<String>>(secret_type: SecretType, path: P, resource_id: ResourceId) -> Self {
        Self { secret_type, path: path.into(), resource_id }
    }
}

/// Observable state of a lease at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    Active,
    Expired,
    Revoked,
}

/// A time-bounded grant of validity for an issued secret.
///
/// `ttl` is the duration granted by the most recent issue or renewal and is
/// measured from `last_renewed_at`. The lease store maintains
/// `expires_at == last_renewed_at + ttl` and `expires_at <= issued_at + max_ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub secret_ref: SecretRef,
    pub issued_at: DateTime<Utc>,
    pub last_renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(with = "seconds")]
    pub ttl: Duration,
    #[serde(with = "seconds")]
    pub max_ttl: Duration,
    pub renewable: bool,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Lease {
    /// Latest instant this lease may ever be extended to
    pub fn max_expires_at(&self) -> DateTime<Utc> {
        chrono::TimeDelta::from_std(self.max_ttl)
            .ok()
            .and_then(|max| self.issued_at.checked_add_signed(max))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether expiry has passed without revocation
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at < now
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> LeaseState {
        if self.revoked {
            LeaseState::Revoked
        } else if self.expires_at < now {
            LeaseState::Expired
        } else {
            LeaseState::Active
        }
    }

    /// Time left before expiry, zero once expired or revoked
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if self.revoked {
            return Duration::ZERO;
        }
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
