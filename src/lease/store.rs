//! In-memory lease bookkeeping.
//!
//! The store is the only owner of [`Lease`] records. Each mutation takes the
//! map's entry guard for one lease id, applies the state transition, and
//! releases it before returning, so operations on the same id are serialized
//! while different ids proceed in parallel. Callers must never hold a lease
//! across an upstream call; they work on the clones returned here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use crate::domain::duration::to_delta;
use crate::domain::{Lease, LeaseId, SecretRef};
use crate::errors::{BackendError, BackendResult};

/// Outcome of a successful renewal
#[derive(Debug, Clone, PartialEq)]
pub struct Renewal {
    /// Lease after the renewal was applied
    pub lease: Lease,
    /// TTL the caller asked for (after zero was replaced by the current TTL)
    pub requested: Duration,
    /// Whether the grant was capped at the max-TTL ceiling
    pub clamped: bool,
}

/// Outcome of a revoke call
#[derive(Debug, Clone, PartialEq)]
pub struct Revocation {
    pub lease: Lease,
    /// The lease was already revoked before this call; nothing changed
    pub already_revoked: bool,
}

/// Tracks outstanding leases and their expiry and renewal state
#[derive(Debug)]
pub struct LeaseStore {
    leases: DashMap<LeaseId, Lease>,
    clock: Arc<dyn Clock>,
}

impl Default for LeaseStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl LeaseStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { leases: DashMap::new(), clock }
    }

    /// Current time according to the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Reject a TTL that is zero or above its ceiling.
    ///
    /// Handlers call this before provisioning anything upstream.
    pub fn validate_ttl(ttl: Duration, max_ttl: Duration) -> BackendResult<()> {
        if ttl.is_zero() {
            return Err(BackendError::invalid_ttl("ttl must be greater than zero"));
        }
        if ttl > max_ttl {
            return Err(BackendError::invalid_ttl(format!(
                "ttl {}s exceeds max_ttl {}s",
                ttl.as_secs(),
                max_ttl.as_secs()
            )));
        }
        Ok(())
    }

    /// Record a new lease for an already provisioned secret
    pub fn issue(
        &self,
        secret_ref: SecretRef,
        ttl: Duration,
        max_ttl: Duration,
        renewable: bool,
    ) -> BackendResult<Lease> {
        Self::validate_ttl(ttl, max_ttl)?;
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(to_delta(ttl)?)
            .ok_or_else(|| BackendError::invalid_ttl("ttl overflows the clock"))?;
        // The ceiling must also be representable
        to_delta(max_ttl)?;

        let lease = Lease {
            id: LeaseId::generate(&secret_ref.path),
            secret_ref,
            issued_at: now,
            last_renewed_at: now,
            expires_at,
            ttl,
            max_ttl,
            renewable,
            revoked: false,
            revoked_at: None,
        };
        self.leases.insert(lease.id.clone(), lease.clone());

        debug!(lease_id = %lease.id, ttl_secs = ttl.as_secs(), max_ttl_secs = max_ttl.as_secs(), "Issued lease");
        Ok(lease)
    }

    /// Extend a lease from now by `requested`, capped at `issued_at + max_ttl`.
    ///
    /// A zero request re-grants the lease's current TTL.
    pub fn renew(&self, id: &LeaseId, requested: Duration) -> BackendResult<Renewal> {
        let mut entry =
            self.leases.get_mut(id).ok_or_else(|| BackendError::not_found("lease", id.as_str()))?;
        let lease = entry.value_mut();
        let now = self.clock.now();

        if lease.revoked {
            return Err(BackendError::already_revoked(id.as_str()));
        }
        if !lease.renewable {
            return Err(BackendError::not_renewable(id.as_str()));
        }
        if lease.is_expired_at(now) {
            return Err(BackendError::lease_expired(id.as_str()));
        }

        let requested = if requested.is_zero() { lease.ttl } else { requested };
        let allowance = (lease.max_expires_at() - now).to_std().unwrap_or(Duration::ZERO);
        let granted = requested.min(allowance);
        if granted.is_zero() {
            return Err(BackendError::lease_expired(id.as_str()));
        }

        lease.last_renewed_at = now;
        lease.ttl = granted;
        lease.expires_at = now + to_delta(granted)?;

        let clamped = granted < requested;
        debug!(lease_id = %id, granted_secs = granted.as_secs(), clamped, "Renewed lease");
        Ok(Renewal { lease: lease.clone(), requested, clamped })
    }

    /// Mark a lease revoked. Revoking twice is a no-op.
    pub fn revoke(&self, id: &LeaseId) -> BackendResult<Revocation> {
        let mut entry =
            self.leases.get_mut(id).ok_or_else(|| BackendError::not_found("lease", id.as_str()))?;
        let lease = entry.value_mut();

        if lease.revoked {
            return Ok(Revocation { lease: lease.clone(), already_revoked: true });
        }

        lease.revoked = true;
        lease.revoked_at = Some(self.clock.now());
        info!(lease_id = %id, "Revoked lease");
        Ok(Revocation { lease: lease.clone(), already_revoked: false })
    }

    pub fn lookup(&self, id: &LeaseId) -> Option<Lease> {
        self.leases.get(id).map(|entry| entry.value().clone())
    }

    /// Unrevoked leases whose expiry is before `now`, soonest first
    pub fn list_expired(&self, now: DateTime<Utc>) -> Vec<Lease> {
        let mut expired: Vec<Lease> = self
            .leases
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));
        expired
    }

    /// Leases whose id sits under `prefix`, ordered by id
    pub fn list_by_prefix(&self, prefix: &str) -> Vec<Lease> {
        let mut leases: Vec<Lease> = self
            .leases
            .iter()
            .filter(|entry| entry.key().has_prefix(prefix))
            .map(|entry| entry.value().clone())
            .collect();
        leases.sort_by(|a, b| a.id.cmp(&b.id));
        leases
    }

    /// Drop revoked tombstones revoked before `older_than`; returns how many went
    pub fn purge_revoked(&self, older_than: DateTime<Utc>) -> usize {
        let before = self.leases.len();
        self.leases.retain(|_, lease| !matches!(lease.revoked_at, Some(at) if lease.revoked && at < older_than));
        before.saturating_sub(self.leases.len())
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Leases neither revoked nor expired
    pub fn active_count(&self) -> usize {
        let now = self.clock.now();
        self.leases.iter().filter(|entry| !entry.value().revoked && !entry.value().is_expired_at(now)).count()
    }
}
