//! Lease lifecycle through the dispatcher: issue, renew, clamp, revoke.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use proptest::prelude::*;
use serde_json::json;

use common::{lease_path, test_backend, test_backend_with, ScriptedUpstream};
use vaultplane::domain::{ResourceId, SecretRef, SecretType};
use vaultplane::handlers::HandlerSettings;
use vaultplane::lease::{LeaseStore, ManualClock};
use vaultplane::ErrorCode;

#[tokio::test]
async fn test_renewal_is_clamped_to_max_ttl() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": "60s", "max_ttl": "120s" })).await;
    let lease = t.issue("dev").await;
    assert_eq!(lease.ttl, Duration::from_secs(60));

    t.clock.advance(Duration::from_secs(45));
    let response = t.call("renew", &lease_path(&lease), json!({ "ttl": "90s" })).await;

    assert!(!response.is_error());
    let renewed = response.lease.unwrap();
    assert_eq!(renewed.ttl, Duration::from_secs(75));
    assert_eq!(renewed.expires_at, lease.issued_at + TimeDelta::seconds(120));
    assert_eq!(response.data["ttl"], 75);
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.warnings[0].code, ErrorCode::TtlExceedsMax);
}

#[tokio::test]
async fn test_renewal_within_bounds_has_no_warning() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": 60, "max_ttl": 600 })).await;
    let lease = t.issue("dev").await;

    t.clock.advance(Duration::from_secs(30));
    let response = t.call("renew", &lease_path(&lease), json!({ "ttl": 120 })).await;
    let renewed = response.lease.unwrap();
    assert_eq!(renewed.ttl, Duration::from_secs(120));
    assert!(response.warnings.is_empty());

    // Zero re-grants the most recent ttl
    t.clock.advance(Duration::from_secs(10));
    let response = t.call("renew", &lease_path(&lease), json!({})).await;
    assert_eq!(response.lease.unwrap().ttl, Duration::from_secs(120));
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let t = test_backend();
    t.create_role("dev", json!({})).await;
    let lease = t.issue("dev").await;
    assert!(t.upstream.has_account(&lease.secret_ref.resource_id));

    let first = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert!(!first.is_error());
    assert_eq!(first.data["revoked"], true);
    assert!(!t.upstream.has_account(&lease.secret_ref.resource_id));

    let second = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert!(!second.is_error());
    assert_eq!(second.lease.unwrap().revoked_at, first.lease.unwrap().revoked_at);
    assert_eq!(t.upstream.teardowns.load(Ordering::SeqCst), 1);

    let renew = t.call("renew", &lease_path(&lease), json!({ "ttl": 30 })).await;
    assert_eq!(renew.error_code(), Some(ErrorCode::AlreadyRevoked));
}

#[tokio::test]
async fn test_non_renewable_and_expired_leases_reject_renewal() {
    let t = test_backend();
    t.create_role("fixed", json!({ "ttl": 60, "renewable": false })).await;
    t.create_role("dev", json!({ "ttl": 60 })).await;

    let fixed = t.issue("fixed").await;
    let response = t.call("renew", &lease_path(&fixed), json!({ "ttl": 30 })).await;
    assert_eq!(response.error_code(), Some(ErrorCode::NotRenewable));

    let lease = t.issue("dev").await;
    t.clock.advance(Duration::from_secs(61));
    let response = t.call("renew", &lease_path(&lease), json!({ "ttl": 30 })).await;
    assert_eq!(response.error_code(), Some(ErrorCode::LeaseExpired));
}

#[tokio::test]
async fn test_failed_teardown_keeps_lease_active() {
    let t = test_backend();
    t.create_role("dev", json!({})).await;
    let lease = t.issue("dev").await;

    ScriptedUpstream::set(&t.upstream.fail_teardown, true);
    let response = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert_eq!(response.error_code(), Some(ErrorCode::RevocationFailed));
    assert!(response.error.unwrap().retryable);
    assert!(!t.backend.leases().lookup(&lease.id).unwrap().revoked);

    ScriptedUpstream::set(&t.upstream.fail_teardown, false);
    let response = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert!(!response.is_error());
    assert!(t.backend.leases().lookup(&lease.id).unwrap().revoked);
}

#[tokio::test]
async fn test_teardown_timeout_keeps_lease_for_retry() {
    let settings = HandlerSettings { upstream_timeout: Duration::from_millis(50), ..HandlerSettings::default() };
    let t = test_backend_with(ScriptedUpstream::new(), settings);
    t.create_role("dev", json!({})).await;
    let lease = t.issue("dev").await;

    t.upstream.set_teardown_delay(Some(Duration::from_secs(30)));
    let response = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert_eq!(response.error_code(), Some(ErrorCode::UpstreamTimeout));
    assert!(response.error.unwrap().retryable);

    let stored = t.backend.leases().lookup(&lease.id).unwrap();
    assert!(!stored.revoked);
    assert!(stored.revoked_at.is_none());
    assert!(t.upstream.has_account(&lease.secret_ref.resource_id));
    assert_eq!(t.upstream.teardowns.load(Ordering::SeqCst), 0);

    t.upstream.set_teardown_delay(None);
    let response = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert!(!response.is_error());
    assert!(t.backend.leases().lookup(&lease.id).unwrap().revoked);
    assert!(!t.upstream.has_account(&lease.secret_ref.resource_id));
    assert_eq!(t.upstream.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_a_warning() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": 60 })).await;
    let lease = t.issue("dev").await;

    ScriptedUpstream::set(&t.upstream.fail_refresh, true);
    let response = t.call("renew", &lease_path(&lease), json!({ "ttl": 120 })).await;
    assert!(!response.is_error());
    assert_eq!(response.lease.unwrap().ttl, Duration::from_secs(120));
    assert_eq!(response.warnings[0].code, ErrorCode::UpstreamFailed);
}

#[tokio::test]
async fn test_invalid_ttl_never_reaches_upstream() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": 60, "max_ttl": 120 })).await;

    let response = t.call("create", "creds/dev", json!({ "ttl": 600 })).await;
    assert_eq!(response.error_code(), Some(ErrorCode::InvalidTtl));
    let response = t.call("create", "creds/dev", json!({ "ttl": 0 })).await;
    assert_eq!(response.error_code(), Some(ErrorCode::InvalidTtl));

    assert_eq!(t.upstream.provisions.load(Ordering::SeqCst), 0);
    assert!(t.backend.leases().is_empty());
}

#[tokio::test]
async fn test_signing_key_lifecycle() {
    let t = test_backend();
    let response = t.call("create", "keys/deploy", json!({ "ttl": "10m" })).await;
    assert!(!response.is_error());
    assert!(response.data["private_key"].as_str().unwrap().contains("PRIVATE KEY"));
    let lease = response.lease.unwrap();

    let read = t.call("read", "keys/deploy", json!({})).await;
    assert_eq!(read.data["keys"][0]["public_key"], response.data["public_key"]);
    assert!(read.data.get("private_key").is_none());

    let renew = t.call("renew", &lease_path(&lease), json!({ "ttl": 60 })).await;
    assert_eq!(renew.error_code(), Some(ErrorCode::NotRenewable));

    let revoke = t.call("revoke", &lease_path(&lease), json!({})).await;
    assert!(!revoke.is_error());
    let read = t.call("read", "keys/deploy", json!({})).await;
    assert_eq!(read.error_code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn test_lease_listing_and_lookup() {
    let t = test_backend();
    t.create_role("dev", json!({ "ttl": 60 })).await;
    t.create_role("ops", json!({ "ttl": 60 })).await;
    let dev = t.issue("dev").await;
    t.issue("ops").await;

    let listed = t.call("read", "leases", json!({ "prefix": "creds/dev" })).await;
    assert_eq!(listed.data["keys"], json!([dev.id.as_str()]));

    let all = t.call("read", "leases", json!({})).await;
    assert_eq!(all.data["keys"].as_array().unwrap().len(), 2);

    t.clock.advance(Duration::from_secs(15));
    let read = t.call("read", &lease_path(&dev), json!({})).await;
    assert_eq!(read.data["state"], "active");
    assert_eq!(read.data["remaining_ttl"], 45);
}

proptest! {
    #[test]
    fn prop_expiry_never_exceeds_max_ttl(
        ttl in 1u64..600,
        extra in 0u64..600,
        steps in proptest::collection::vec((0u64..120, 0u64..1200), 1..20),
    ) {
        let clock = ManualClock::starting_now();
        let store = LeaseStore::new(Arc::new(clock.clone()));
        let max_ttl = Duration::from_secs(ttl + extra);
        let lease = store
            .issue(
                SecretRef::new(SecretType::Credential, "creds/prop", ResourceId::generate()),
                Duration::from_secs(ttl),
                max_ttl,
                true,
            )
            .unwrap();
        let ceiling = lease.issued_at + TimeDelta::seconds((ttl + extra) as i64);

        for (advance, requested) in steps {
            clock.advance(Duration::from_secs(advance));
            if let Ok(renewal) = store.renew(&lease.id, Duration::from_secs(requested)) {
                prop_assert!(renewal.lease.expires_at <= ceiling);
                prop_assert!(renewal.lease.ttl <= max_ttl);
                prop_assert!(renewal.lease.ttl > Duration::ZERO);
                prop_assert_eq!(
                    renewal.lease.expires_at,
                    renewal.lease.last_renewed_at + TimeDelta::from_std(renewal.lease.ttl).unwrap()
                );
            }
            prop_assert!(store.lookup(&lease.id).unwrap().expires_at <= ceiling);
        }
    }
}
