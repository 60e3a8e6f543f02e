//! Static key/value secrets.
//!
//! Kv secrets have no external resource and are not leased: a write stores
//! the parameters as-is and a read returns them.

use serde_json::{Map, Value};
use tracing::debug;

use super::{HandlerContext, RequestContext};
use crate::domain::{Request, Response};
use crate::errors::{BackendError, BackendResult, ErrorCode};
use crate::storage::KV_PREFIX;

fn key(path: &str) -> String {
    format!("{}{}", KV_PREFIX, path)
}

/// Store the request's parameters under `path`
pub(super) async fn write(
    ctx: &HandlerContext,
    rc: &mut RequestContext,
    request: &Request,
    path: &str,
) -> BackendResult<Response> {
    let mut data = Map::new();
    for (name, value) in request.parameters() {
        if name == "ttl" {
            rc.warn(ErrorCode::InvalidParameter, "kv secrets are not leased; 'ttl' was ignored");
            continue;
        }
        match value {
            Value::String(_) => {
                data.insert(name.clone(), value.clone());
            }
            _ => return Err(BackendError::invalid_parameter(name.as_str(), "kv values must be strings")),
        }
    }
    if data.is_empty() {
        return Err(BackendError::invalid_parameter("parameters", "at least one key/value pair is required"));
    }

    ctx.storage.put(&key(path), Value::Object(data)).await?;
    debug!(path, "Stored kv secret");
    Ok(Response::new())
}

pub async fn read(ctx: &HandlerContext, path: &str) -> BackendResult<Response> {
    match ctx.storage.get(&key(path)).await? {
        Some(Value::Object(data)) => Ok(Response::with_data(data)),
        Some(_) => Err(BackendError::internal(format!("kv entry '{}' is not an object", path))),
        None => Err(BackendError::not_found("secret", path)),
    }
}

pub async fn delete(ctx: &HandlerContext, path: &str) -> BackendResult<Response> {
    if ctx.storage.delete(&key(path)).await? {
        Ok(Response::new())
    } else {
        Err(BackendError::not_found("secret", path))
    }
}

/// Keys stored under `kv/`, relative to it
pub async fn list(ctx: &HandlerContext) -> BackendResult<Response> {
    let keys = ctx.storage.list(KV_PREFIX).await?;
    Ok(Response::new().insert("keys", Value::from(keys)))
}
