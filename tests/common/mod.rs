//! Common test utilities for all integration tests.
//!
//! Provides backend setup on a manual clock and scriptable upstreams.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use vaultplane::backend::Backend;
use vaultplane::domain::{Lease, ResourceId, Role};
use vaultplane::handlers::HandlerSettings;
use vaultplane::lease::ManualClock;
use vaultplane::upstream::{CredentialUpstream, InMemoryUpstream, ProvisionedCredential, UpstreamError};
use vaultplane::Response;

/// Upstream whose behavior tests can switch at runtime
#[derive(Debug, Default)]
pub struct ScriptedUpstream {
    inner: InMemoryUpstream,
    pub provision_delay: Option<Duration>,
    teardown_delay: Mutex<Option<Duration>>,
    pub fail_refresh: AtomicBool,
    pub fail_teardown: AtomicBool,
    pub panic_on_provision: AtomicBool,
    pub provisions: AtomicUsize,
    pub teardowns: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisioning sleeps for `delay` before doing anything
    pub fn slow(delay: Duration) -> Self {
        Self { provision_delay: Some(delay), ..Self::default() }
    }

    /// Teardown sleeps for `delay` before doing anything; `None` restores it
    pub fn set_teardown_delay(&self, delay: Option<Duration>) {
        *self.teardown_delay.lock().unwrap() = delay;
    }

    pub fn account_count(&self) -> usize {
        self.inner.account_count()
    }

    pub fn has_account(&self, resource_id: &ResourceId) -> bool {
        self.inner.has_account(resource_id)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialUpstream for ScriptedUpstream {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn provision(&self, role: &Role, ttl: Duration) -> Result<ProvisionedCredential, UpstreamError> {
        if let Some(delay) = self.provision_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_provision.load(Ordering::SeqCst) {
            panic!("upstream exploded while provisioning");
        }
        self.provisions.fetch_add(1, Ordering::SeqCst);
        self.inner.provision(role, ttl).await
    }

    async fn refresh(&self, resource_id: &ResourceId, ttl: Duration) -> Result<(), UpstreamError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unavailable("refresh endpoint down".into()));
        }
        self.inner.refresh(resource_id, ttl).await
    }

    async fn teardown(&self, resource_id: &ResourceId) -> Result<(), UpstreamError> {
        let delay = *self.teardown_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unavailable("teardown endpoint down".into()));
        }
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.inner.teardown(resource_id).await
    }
}

pub struct TestBackend {
    pub backend: Arc<Backend>,
    pub clock: ManualClock,
    pub upstream: Arc<ScriptedUpstream>,
}

pub fn test_backend() -> TestBackend {
    test_backend_with(ScriptedUpstream::new(), HandlerSettings::default())
}

pub fn test_backend_with(upstream: ScriptedUpstream, settings: HandlerSettings) -> TestBackend {
    let clock = ManualClock::starting_now();
    let upstream = Arc::new(upstream);
    let backend = Backend::builder()
        .clock(Arc::new(clock.clone()))
        .upstream(upstream.clone())
        .settings(settings)
        .build()
        .expect("default routes register");
    TestBackend { backend: Arc::new(backend), clock, upstream }
}

pub fn request(operation: &str, path: &str, parameters: Value) -> Value {
    json!({ "operation": operation, "path": path, "parameters": parameters })
}

/// Path addressing a lease through the `leases/` routes
pub fn lease_path(lease: &Lease) -> String {
    format!("leases/{}", lease.id)
}

impl TestBackend {
    pub async fn call(&self, operation: &str, path: &str, parameters: Value) -> Response {
        self.backend.handle(request(operation, path, parameters)).await
    }

    pub async fn create_role(&self, name: &str, parameters: Value) {
        let response = self.call("create", &format!("roles/{}", name), parameters).await;
        assert!(!response.is_error(), "role creation failed: {:?}", response.error);
    }

    /// Issue a credential from `role` and return its lease
    pub async fn issue(&self, role: &str) -> Lease {
        let response = self.call("create", &format!("creds/{}", role), json!({})).await;
        assert!(!response.is_error(), "credential issue failed: {:?}", response.error);
        response.lease.expect("credential responses carry a lease")
    }
}
