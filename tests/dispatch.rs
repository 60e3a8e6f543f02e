//! Dispatcher behavior: request validation, routing precedence, error framing.

mod common;

use serde_json::json;

use common::{test_backend, ScriptedUpstream};
use vaultplane::backend::{Backend, Endpoint};
use vaultplane::domain::Operation;
use vaultplane::router::Router;
use vaultplane::{BackendError, ErrorCode};

#[test]
fn test_literal_segment_beats_capture() {
    let mut router = Router::new();
    router.register("roles/{name}", Operation::Read, "role").unwrap();
    router.register("roles/{name}", Operation::Delete, "delete_role").unwrap();
    router.register("roles/admin", Operation::Read, "admin").unwrap();

    let matched = router.route(Operation::Read, "roles/admin").unwrap();
    assert_eq!(*matched.handler, "admin");
    assert!(matched.captures.is_empty());

    let matched = router.route(Operation::Read, "roles/dev").unwrap();
    assert_eq!(*matched.handler, "role");
    assert_eq!(matched.captures.get("name"), Some("dev"));

    // The most specific match owns the path even if a looser pattern accepts the operation
    let err = router.route(Operation::Delete, "roles/admin").unwrap_err();
    match err {
        BackendError::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, vec![Operation::Read]),
        other => panic!("expected method_not_allowed, got {other:?}"),
    }
}

#[test]
fn test_capture_beats_catch_all() {
    let mut router = Router::new();
    router.register("kv/{*path}", Operation::Read, "catch_all").unwrap();
    router.register("kv/{bucket}", Operation::Read, "bucket").unwrap();

    assert_eq!(*router.route(Operation::Read, "kv/app").unwrap().handler, "bucket");
    let matched = router.route(Operation::Read, "kv/app/db").unwrap();
    assert_eq!(*matched.handler, "catch_all");
    assert_eq!(matched.captures.get("path"), Some("app/db"));
}

#[test]
fn test_duplicate_shape_conflicts() {
    let mut router = Router::new();
    router.register("creds/{role}", Operation::Create, 1).unwrap();
    let err = router.register("creds/{name}", Operation::Create, 2).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PatternConflict);
    // Same shape with another operation is fine
    router.register("creds/{name}", Operation::Read, 3).unwrap();
}

#[tokio::test]
async fn test_literal_route_through_backend() {
    let backend = Backend::builder().build().unwrap();
    let routes = [
        ("roles/{name}", Operation::Read, Endpoint::ReadRole),
        ("roles/{name}", Operation::Create, Endpoint::WriteRole),
        ("roles/admin", Operation::Read, Endpoint::ListRoles),
    ];
    let backend = Backend::with_routes(backend.context().clone(), &routes).unwrap();

    let created = backend.handle(json!({ "operation": "create", "path": "roles/dev" })).await;
    assert!(!created.is_error());

    let admin = backend.handle(json!({ "operation": "read", "path": "roles/admin" })).await;
    assert_eq!(admin.data["keys"], json!(["dev"]));

    let dev = backend.handle(json!({ "operation": "read", "path": "roles/dev" })).await;
    assert_eq!(dev.data["name"], "dev");
}

#[tokio::test]
async fn test_schema_violations_are_malformed() {
    let t = test_backend();
    let cases = [
        json!(null),
        json!({ "operation": "create" }),
        json!({ "operation": "purge", "path": "roles/dev" }),
        json!({ "operation": "read", "path": "roles/../kv" }),
        json!({ "operation": "create", "path": "roles/dev", "parameters": "ttl=60" }),
    ];
    for case in cases {
        let response = t.backend.handle(case.clone()).await;
        assert_eq!(response.error_code(), Some(ErrorCode::MalformedRequest), "case {case}");
        assert!(response.data.is_empty());
    }
}

#[tokio::test]
async fn test_routing_failures() {
    let t = test_backend();

    let response = t.call("read", "sys/mounts", json!({})).await;
    assert_eq!(response.error_code(), Some(ErrorCode::NoRoute));

    let response = t.call("revoke", "roles/dev", json!({})).await;
    assert_eq!(response.error_code(), Some(ErrorCode::MethodNotAllowed));
}

#[tokio::test]
async fn test_warnings_survive_errors() {
    let t = test_backend();
    let response = t.call("create", "roles/dev", json!({ "max_ttl": "30d", "ttl": "20d" })).await;

    assert_eq!(response.error_code(), Some(ErrorCode::InvalidTtl));
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.warnings[0].code, ErrorCode::TtlExceedsMax);
}

#[tokio::test]
async fn test_kv_ttl_is_ignored_with_warning() {
    let t = test_backend();
    let response = t.call("create", "kv/app/api", json!({ "token": "abc", "ttl": 60 })).await;
    assert!(!response.is_error());
    assert!(response.lease.is_none());
    assert_eq!(response.warnings[0].code, ErrorCode::InvalidParameter);

    let response = t.call("read", "kv/app/api", json!({})).await;
    assert_eq!(response.data.get("token"), Some(&json!("abc")));
    assert!(response.data.get("ttl").is_none());
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
    let t = test_backend();
    t.create_role("dev", json!({})).await;

    ScriptedUpstream::set(&t.upstream.panic_on_provision, true);
    let response = t.call("create", "creds/dev", json!({})).await;
    assert_eq!(response.error_code(), Some(ErrorCode::Internal));
    assert!(t.backend.leases().is_empty());

    // The backend keeps serving afterwards
    ScriptedUpstream::set(&t.upstream.panic_on_provision, false);
    let lease = t.issue("dev").await;
    assert!(t.backend.leases().lookup(&lease.id).is_some());
}

#[tokio::test]
async fn test_role_management() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": "5m", "username_prefix": "app" })).await;

    let read = t.call("read", "roles/dev", json!({})).await;
    assert_eq!(read.data["ttl"], 300);
    assert_eq!(read.data["username_prefix"], "app");

    let issued = t.call("create", "creds/dev", json!({})).await;
    assert!(issued.data["username"].as_str().unwrap().starts_with("app-dev-"));
    assert!(!issued.data["password"].as_str().unwrap().is_empty());

    let deleted = t.call("delete", "roles/dev", json!({})).await;
    assert!(!deleted.is_error());
    // Outstanding leases survive their role
    assert!(!t.backend.leases().lookup(&issued.lease.unwrap().id).unwrap().revoked);

    let missing = t.call("read", "roles/dev", json!({})).await;
    assert_eq!(missing.error_code(), Some(ErrorCode::NotFound));
    let missing = t.call("create", "creds/dev", json!({})).await;
    assert_eq!(missing.error_code(), Some(ErrorCode::NotFound));
}
