//! Request dispatch: decode, route, run, and frame the response.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn, Instrument, Span};

use super::{Backend, Endpoint};
use crate::domain::{LeaseId, Request, Response};
use crate::errors::{BackendError, BackendResult, ErrorCode};
use crate::handlers::{kv, leases, roles, signing_key, RequestContext, RevokeTrigger, SecretHandler};
use crate::router::Captures;

impl Backend {
    /// Validate a raw request and dispatch it.
    ///
    /// Every failure, including a handler panic, comes back as an error
    /// response.
    pub async fn handle(&self, raw: Value) -> Response {
        match Request::from_value(raw) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => {
                warn!(error = %err, "Rejected malformed request");
                self.ctx.metrics.record_request("unknown", err.code().as_str(), Duration::ZERO);
                Response::from_error(&err, Vec::new())
            }
        }
    }

    /// Dispatch an already validated request
    pub async fn handle_request(&self, request: Request) -> Response {
        let span = crate::request_span!(request.operation(), request.path());
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: Request) -> Response {
        let started = Instant::now();
        let mut rc = RequestContext::new();

        let outcome = AssertUnwindSafe(self.dispatch(&mut rc, &request)).catch_unwind().await;
        let result = outcome.unwrap_or_else(|payload| {
            error!(panic = %panic_message(payload.as_ref()), "Handler panicked");
            self.ctx.metrics.record_panic();
            Err(BackendError::internal("request handler panicked"))
        });

        let warnings = rc.into_warnings();
        for warning in &warnings {
            self.ctx.metrics.record_warning(warning.code.as_str());
        }

        let operation = request.operation().as_str();
        match result {
            Ok(mut response) => {
                if let Some(lease) = &response.lease {
                    Span::current().record("lease_id", lease.id.as_str());
                }
                let produced = std::mem::take(&mut response.warnings);
                response.warnings = warnings.into_iter().chain(produced).collect();

                self.ctx.metrics.record_request(operation, "ok", started.elapsed());
                debug!(warnings = response.warnings.len(), "Request completed");
                response
            }
            Err(err) => {
                let code = err.code();
                if code == ErrorCode::Internal {
                    error!(code = %code, error = %err, "Request failed");
                } else {
                    warn!(code = %code, error = %err, "Request failed");
                }
                self.ctx.metrics.record_request(operation, code.as_str(), started.elapsed());
                Response::from_error(&err, warnings)
            }
        }
    }

    async fn dispatch(&self, rc: &mut RequestContext, request: &Request) -> BackendResult<Response> {
        let matched = self.router.route(request.operation(), request.path())?;
        let ctx = &self.ctx;
        let captures = &matched.captures;

        match *matched.handler {
            Endpoint::ListRoles => roles::list(ctx).await,
            Endpoint::WriteRole => roles::write(ctx, rc, request, captures.require("name")?).await,
            Endpoint::ReadRole => roles::read(ctx, captures.require("name")?).await,
            Endpoint::DeleteRole => roles::delete(ctx, captures.require("name")?).await,
            Endpoint::Issue(handler) => handler.create(ctx, rc, request, captures).await,
            Endpoint::ListKv => kv::list(ctx).await,
            Endpoint::ReadKv => kv::read(ctx, captures.require("path")?).await,
            Endpoint::DeleteKv => kv::delete(ctx, captures.require("path")?).await,
            Endpoint::ReadSigningKey => signing_key::read(ctx, captures.require("name")?).await,
            Endpoint::ListLeases => leases::list(ctx, request),
            Endpoint::ReadLease => leases::read(ctx, &lease_id(captures)?),
            Endpoint::RenewLease => {
                let lease_id = lease_id(captures)?;
                // Zero asks for the lease's current ttl again
                let requested = request.duration_param("ttl")?.unwrap_or(Duration::ZERO);
                self.owner(&lease_id)?.renew(ctx, rc, &lease_id, requested).await
            }
            Endpoint::RevokeLease => {
                let lease_id = lease_id(captures)?;
                self.owner(&lease_id)?.revoke(ctx, &lease_id, RevokeTrigger::Request).await
            }
        }
    }

    /// Handler for the secret type that issued `lease_id`
    pub(super) fn owner(&self, lease_id: &LeaseId) -> BackendResult<SecretHandler> {
        self.ctx
            .leases
            .lookup(lease_id)
            .map(|lease| SecretHandler::for_type(lease.secret_ref.secret_type))
            .ok_or_else(|| BackendError::not_found("lease", lease_id.as_str()))
    }
}

fn lease_id(captures: &Captures) -> BackendResult<LeaseId> {
    captures.require("lease_id").map(LeaseId::from)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> Backend {
        Backend::builder().build().unwrap()
    }

    #[tokio::test]
    async fn test_handle_rejects_malformed_requests() {
        let backend = backend();
        let response = backend.handle(json!({ "operation": "list", "path": "roles" })).await;
        assert_eq!(response.error_code(), Some(ErrorCode::MalformedRequest));

        let response = backend.handle(json!(["not", "an", "object"])).await;
        assert_eq!(response.error_code(), Some(ErrorCode::MalformedRequest));
    }

    #[tokio::test]
    async fn test_routing_errors_become_responses() {
        let backend = backend();

        let response = backend.handle(json!({ "operation": "read", "path": "nowhere/at/all" })).await;
        assert_eq!(response.error_code(), Some(ErrorCode::NoRoute));

        let response = backend.handle(json!({ "operation": "delete", "path": "creds/dev" })).await;
        assert_eq!(response.error_code(), Some(ErrorCode::MethodNotAllowed));
    }

    #[tokio::test]
    async fn test_unknown_lease_is_not_found() {
        let backend = backend();
        for operation in ["renew", "revoke", "read"] {
            let response = backend.handle(json!({ "operation": operation, "path": "leases/creds/dev/missing" })).await;
            assert_eq!(response.error_code(), Some(ErrorCode::NotFound), "operation {operation}");
        }
    }

    #[tokio::test]
    async fn test_kv_round_trip_through_dispatch() {
        let backend = backend();
        let written = backend
            .handle(json!({ "operation": "create", "path": "kv/team/db", "parameters": { "password": "hunter2" } }))
            .await;
        assert!(!written.is_error());
        assert!(written.lease.is_none());

        let read = backend.handle(json!({ "operation": "read", "path": "kv/team/db" })).await;
        assert_eq!(read.data["password"], "hunter2");

        let listed = backend.handle(json!({ "operation": "read", "path": "kv" })).await;
        assert_eq!(listed.data["keys"], json!(["team/db"]));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
