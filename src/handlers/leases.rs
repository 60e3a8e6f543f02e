//! Lease lookup and listing.

use serde_json::Value;

use super::{lease_response, HandlerContext};
use crate::domain::{LeaseId, Request, Response};
use crate::errors::{BackendError, BackendResult};

pub fn read(ctx: &HandlerContext, lease_id: &LeaseId) -> BackendResult<Response> {
    let lease = ctx.leases.lookup(lease_id).ok_or_else(|| BackendError::not_found("lease", lease_id.as_str()))?;
    let now = ctx.leases.now();
    let state = lease.state_at(now);
    let remaining = lease.remaining_at(now);

    let mut response = lease_response(lease);
    response.data.insert("state".into(), serde_json::to_value(state).unwrap_or(Value::Null));
    response.data.insert("remaining_ttl".into(), Value::from(remaining.as_secs()));
    Ok(response)
}

/// Lease ids under the optional `prefix` parameter
pub fn list(ctx: &HandlerContext, request: &Request) -> BackendResult<Response> {
    let prefix = request.str_param("prefix")?.unwrap_or("");
    let keys: Vec<Value> =
        ctx.leases.list_by_prefix(prefix).into_iter().map(|lease| Value::String(lease.id.into_string())).collect();
    Ok(Response::new().insert("keys", Value::Array(keys)))
}
