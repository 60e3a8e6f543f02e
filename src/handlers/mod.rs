//! # Secret Handlers
//!
//! Per-secret-type lifecycle logic. The set of secret types is closed, so
//! handlers are an enum rather than trait objects; each variant declares its
//! [`Capability`] set up front and the lifecycle entry points check it before
//! doing any work.
//!
//! Ordering rules every handler follows:
//!
//! - TTLs are validated before anything is provisioned upstream.
//! - A lease is issued only after the external effect succeeded, and revoked
//!   only after teardown succeeded.
//! - Upstream calls run under [`bounded`](crate::upstream::bounded) and never
//!   while a lease store guard is held.

pub mod credential;
pub mod kv;
pub mod leases;
pub mod roles;
pub mod signing_key;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::domain::{LeaseId, Request, Response, SecretType, Warning};
use crate::errors::{BackendError, BackendResult, ErrorCode};
use crate::lease::LeaseStore;
use crate::observability::MetricsRecorder;
use crate::router::Captures;
use crate::storage::{RoleRepository, Storage};
use crate::upstream::CredentialUpstream;

/// Lifecycle steps a secret type may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Create,
    Renew,
    Revoke,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Create => "create",
            Capability::Renew => "renew",
            Capability::Revoke => "revoke",
        })
    }
}

/// Limits handlers apply to every request
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub upstream_timeout: Duration,
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(5),
            default_ttl: Duration::from_secs(3600),
            max_ttl: Duration::from_secs(86400),
        }
    }
}

/// Shared collaborators handed to every handler call
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub leases: Arc<LeaseStore>,
    pub storage: Arc<dyn Storage>,
    pub roles: RoleRepository,
    pub upstream: Arc<dyn CredentialUpstream>,
    pub settings: HandlerSettings,
    pub metrics: MetricsRecorder,
}

/// Per-request scratch state: warnings collected along the way survive into
/// the response whether the request succeeds or fails.
#[derive(Debug, Default)]
pub struct RequestContext {
    warnings: Vec<Warning>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn<S: Into<String>>(&mut self, code: ErrorCode, message: S) {
        let warning = Warning::new(code, message);
        tracing::warn!(code = %warning.code, message = %warning.message, "Request warning");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// Why a lease is being revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeTrigger {
    Request,
    Sweep,
}

impl RevokeTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevokeTrigger::Request => "request",
            RevokeTrigger::Sweep => "sweep",
        }
    }
}

/// Handler for one secret type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretHandler {
    Kv,
    SigningKey,
    Credential,
}

impl SecretHandler {
    pub fn for_type(secret_type: SecretType) -> Self {
        match secret_type {
            SecretType::Kv => SecretHandler::Kv,
            SecretType::SigningKey => SecretHandler::SigningKey,
            SecretType::Credential => SecretHandler::Credential,
        }
    }

    pub fn secret_type(&self) -> SecretType {
        match self {
            SecretHandler::Kv => SecretType::Kv,
            SecretHandler::SigningKey => SecretType::SigningKey,
            SecretHandler::Credential => SecretType::Credential,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            SecretHandler::Kv => &[Capability::Create],
            SecretHandler::SigningKey => &[Capability::Create, Capability::Revoke],
            SecretHandler::Credential => &[Capability::Create, Capability::Renew, Capability::Revoke],
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn require(&self, capability: Capability) -> BackendResult<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(BackendError::internal(format!(
                "{} secrets do not support {}",
                self.secret_type(),
                capability
            )))
        }
    }

    /// Produce a new secret from a routed request
    pub async fn create(
        &self,
        ctx: &HandlerContext,
        rc: &mut RequestContext,
        request: &Request,
        captures: &Captures,
    ) -> BackendResult<Response> {
        self.require(Capability::Create)?;
        let response = match self {
            SecretHandler::Kv => kv::write(ctx, rc, request, captures.require("path")?).await?,
            SecretHandler::SigningKey => signing_key::create(ctx, request, captures.require("name")?).await?,
            SecretHandler::Credential => credential::create(ctx, request, captures.require("role")?).await?,
        };
        if response.lease.is_some() {
            ctx.metrics.record_lease_issued(self.secret_type().as_str());
        }
        Ok(response)
    }

    /// Extend a lease owned by this secret type
    pub async fn renew(
        &self,
        ctx: &HandlerContext,
        rc: &mut RequestContext,
        lease_id: &LeaseId,
        requested: Duration,
    ) -> BackendResult<Response> {
        if !self.supports(Capability::Renew) {
            let revoked = ctx.leases.lookup(lease_id).is_some_and(|lease| lease.revoked);
            return Err(if revoked {
                BackendError::already_revoked(lease_id.as_str())
            } else {
                BackendError::not_renewable(lease_id.as_str())
            });
        }

        async {
            let renewal = ctx.leases.renew(lease_id, requested)?;
            if renewal.clamped {
                rc.warn(
                    ErrorCode::TtlExceedsMax,
                    format!(
                        "requested ttl {}s exceeds the lease's max ttl; granted {}s",
                        renewal.requested.as_secs(),
                        renewal.lease.ttl.as_secs()
                    ),
                );
            }
            ctx.metrics.record_lease_renewed(self.secret_type().as_str(), renewal.clamped);

            if let SecretHandler::Credential = self {
                credential::refresh(ctx, rc, &renewal.lease).await;
            }

            Ok(lease_response(renewal.lease))
        }
        .instrument(crate::lease_span!("renew", lease_id))
        .await
    }

    /// Tear down the external resource, then revoke the lease.
    ///
    /// A lease that is already revoked is returned as-is without any
    /// external call.
    pub async fn revoke(
        &self,
        ctx: &HandlerContext,
        lease_id: &LeaseId,
        trigger: RevokeTrigger,
    ) -> BackendResult<Response> {
        self.require(Capability::Revoke)?;

        async {
            let lease =
                ctx.leases.lookup(lease_id).ok_or_else(|| BackendError::not_found("lease", lease_id.as_str()))?;
            if lease.revoked {
                return Ok(lease_response(lease));
            }

            match self {
                SecretHandler::Credential => credential::teardown(ctx, &lease).await?,
                SecretHandler::SigningKey => signing_key::teardown(ctx, &lease).await?,
                // Kv secrets are never leased and fail the capability check above
                SecretHandler::Kv => {}
            }

            let revocation = ctx.leases.revoke(lease_id)?;
            if !revocation.already_revoked {
                ctx.metrics.record_lease_revoked(self.secret_type().as_str(), trigger.as_str());
            }
            Ok(lease_response(revocation.lease))
        }
        .instrument(crate::lease_span!("revoke", lease_id, trigger = trigger.as_str()))
        .await
    }
}

/// Response carrying a lease and its headline fields
pub(crate) fn lease_response(lease: crate::domain::Lease) -> Response {
    Response::new()
        .insert("lease_id", serde_json::Value::String(lease.id.to_string()))
        .insert("ttl", serde_json::Value::from(lease.ttl.as_secs()))
        .insert("renewable", serde_json::Value::Bool(lease.renewable))
        .insert("revoked", serde_json::Value::Bool(lease.revoked))
        .lease(lease)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::lease::ManualClock;
    use crate::storage::MemoryStorage;
    use crate::upstream::InMemoryUpstream;

    pub struct Fixture {
        pub ctx: HandlerContext,
        pub clock: ManualClock,
        pub upstream: Arc<InMemoryUpstream>,
    }

    pub fn fixture() -> Fixture {
        let clock = ManualClock::starting_now();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let upstream = Arc::new(InMemoryUpstream::new());
        let ctx = HandlerContext {
            leases: Arc::new(LeaseStore::new(Arc::new(clock.clone()))),
            roles: RoleRepository::new(Arc::clone(&storage)),
            storage,
            upstream: upstream.clone(),
            settings: HandlerSettings::default(),
            metrics: MetricsRecorder::new(),
        };
        Fixture { ctx, clock, upstream }
    }
}
