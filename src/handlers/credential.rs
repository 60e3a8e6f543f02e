//! Dynamic credentials provisioned through the upstream.

use tracing::{info, warn};

use super::{HandlerContext, RequestContext};
use crate::domain::{Lease, Request, ResourceId, Response, Secret, SecretRef, SecretType};
use crate::errors::{BackendError, BackendResult, ErrorCode};
use crate::lease::LeaseStore;
use crate::upstream::bounded;

/// Provision a credential for `role_name` and lease it
pub(super) async fn create(ctx: &HandlerContext, request: &Request, role_name: &str) -> BackendResult<Response> {
    let role = ctx.roles.require(role_name).await?;
    let ttl = request.duration_param("ttl")?.unwrap_or(role.ttl);
    LeaseStore::validate_ttl(ttl, role.max_ttl)?;

    let limit = ctx.settings.upstream_timeout;
    let provisioned = bounded(&ctx.metrics, "provision", limit, ctx.upstream.provision(&role, ttl))
        .await?
        .map_err(|e| BackendError::upstream_failed(e.to_string()))?;

    let secret_ref = SecretRef::new(SecretType::Credential, request.path(), provisioned.resource_id.clone());
    let lease = match ctx.leases.issue(secret_ref, ttl, role.max_ttl, role.renewable) {
        Ok(lease) => lease,
        Err(err) => {
            discard(ctx, &provisioned.resource_id).await;
            return Err(err);
        }
    };

    info!(
        lease_id = %lease.id,
        role = %role.name,
        upstream = ctx.upstream.name(),
        ttl_secs = ttl.as_secs(),
        "Issued credential"
    );

    let data = Secret::new()
        .with_text("username", provisioned.username)
        .with_text("password", provisioned.password)
        .into_response_data();
    Ok(Response::with_data(data).lease(lease))
}

/// Push a renewed TTL upstream. Failures only warn: the lease itself is
/// already extended.
pub(super) async fn refresh(ctx: &HandlerContext, rc: &mut RequestContext, lease: &Lease) {
    let limit = ctx.settings.upstream_timeout;
    let call = ctx.upstream.refresh(&lease.secret_ref.resource_id, lease.ttl);
    match bounded(&ctx.metrics, "refresh", limit, call).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => rc.warn(ErrorCode::UpstreamFailed, format!("upstream refresh failed: {}", e)),
        Err(e) => rc.warn(ErrorCode::UpstreamTimeout, e.to_string()),
    }
}

/// Destroy the upstream credential guarded by `lease`
pub(super) async fn teardown(ctx: &HandlerContext, lease: &Lease) -> BackendResult<()> {
    let limit = ctx.settings.upstream_timeout;
    bounded(&ctx.metrics, "teardown", limit, ctx.upstream.teardown(&lease.secret_ref.resource_id))
        .await?
        .map_err(|e| BackendError::revocation_failed(lease.id.as_str(), e.to_string()))
}

/// Best-effort cleanup of a credential that never got a lease
async fn discard(ctx: &HandlerContext, resource_id: &ResourceId) {
    let limit = ctx.settings.upstream_timeout;
    match bounded(&ctx.metrics, "teardown", limit, ctx.upstream.teardown(resource_id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(resource_id = %resource_id, error = %e, "Failed to discard unleased credential"),
        Err(e) => warn!(resource_id = %resource_id, error = %e, "Timed out discarding unleased credential"),
    }
}
