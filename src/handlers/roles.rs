//! Credential role management.

use std::time::Duration;

use serde_json::Value;

use super::{HandlerContext, RequestContext};
use crate::domain::{Operation, Request, Response, Role};
use crate::errors::{BackendError, BackendResult, ErrorCode};
use crate::lease::LeaseStore;

const FIELDS: [&str; 4] = ["ttl", "max_ttl", "renewable", "username_prefix"];

fn role_data(role: &Role) -> BackendResult<Response> {
    match serde_json::to_value(role) {
        Ok(Value::Object(data)) => Ok(Response::with_data(data)),
        Ok(_) => Err(BackendError::internal("role did not encode as an object")),
        Err(e) => Err(BackendError::internal(format!("Failed to encode role: {}", e))),
    }
}

/// Create or update a role. Unspecified fields keep their stored value on
/// update and fall back to the configured defaults on create.
pub async fn write(
    ctx: &HandlerContext,
    rc: &mut RequestContext,
    request: &Request,
    name: &str,
) -> BackendResult<Response> {
    if let Some(unknown) = request.parameters().keys().find(|k| !FIELDS.contains(&k.as_str())) {
        return Err(BackendError::invalid_parameter(unknown.as_str(), "unknown role field"));
    }

    let existing = ctx.roles.get(name).await?;
    if request.operation() == Operation::Update && existing.is_none() {
        return Err(BackendError::not_found("role", name));
    }
    let settings = &ctx.settings;

    let mut max_ttl = match request.duration_param("max_ttl")? {
        Some(max_ttl) => max_ttl,
        None => existing.as_ref().map_or(settings.max_ttl, |r| r.max_ttl),
    };
    if max_ttl > settings.max_ttl {
        rc.warn(
            ErrorCode::TtlExceedsMax,
            format!(
                "max_ttl {}s exceeds the backend limit; capped at {}s",
                max_ttl.as_secs(),
                settings.max_ttl.as_secs()
            ),
        );
        max_ttl = settings.max_ttl;
    }

    let ttl: Duration = match request.duration_param("ttl")? {
        Some(ttl) => ttl,
        None => existing.as_ref().map_or(settings.default_ttl.min(max_ttl), |r| r.ttl.min(max_ttl)),
    };
    LeaseStore::validate_ttl(ttl, max_ttl)?;

    let renewable = match request.bool_param("renewable")? {
        Some(renewable) => renewable,
        None => existing.as_ref().map_or(true, |r| r.renewable),
    };

    let username_prefix = match request.str_param("username_prefix")? {
        Some(prefix) => {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(BackendError::invalid_parameter(
                    "username_prefix",
                    "must be non-empty and contain only letters, digits, '-' or '_'",
                ));
            }
            prefix.to_string()
        }
        None => existing.map_or_else(|| Role::DEFAULT_USERNAME_PREFIX.to_string(), |r| r.username_prefix),
    };

    let role = Role { name: name.to_string(), ttl, max_ttl, renewable, username_prefix };
    ctx.roles.put(&role).await?;
    role_data(&role)
}

pub async fn read(ctx: &HandlerContext, name: &str) -> BackendResult<Response> {
    role_data(&ctx.roles.require(name).await?)
}

/// Delete a role. Credentials already issued from it keep their leases.
pub async fn delete(ctx: &HandlerContext, name: &str) -> BackendResult<Response> {
    if ctx.roles.delete(name).await? {
        Ok(Response::new())
    } else {
        Err(BackendError::not_found("role", name))
    }
}

pub async fn list(ctx: &HandlerContext) -> BackendResult<Response> {
    Ok(Response::new().insert("keys", Value::from(ctx.roles.list().await?)))
}
