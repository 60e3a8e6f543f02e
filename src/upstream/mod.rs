//! # Credential Upstream
//!
//! The external system that actually creates and destroys dynamic
//! credentials (a database, a cloud IAM API). The backend only talks to it
//! through [`CredentialUpstream`] and always under a time bound, see
//! [`bounded`].

pub mod memory;

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::{ResourceId, Role, SecretString};
use crate::errors::{BackendError, BackendResult};
use crate::observability::MetricsRecorder;

pub use memory::InMemoryUpstream;

/// Failures reported by an upstream system
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Upstream could not be reached or is refusing work
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream refused the request
    #[error("upstream rejected request: {0}")]
    Rejected(String),

    /// The resource is unknown upstream
    #[error("upstream resource '{0}' not found")]
    NotFound(String),
}

/// A credential freshly created upstream
#[derive(Debug, Clone)]
pub struct ProvisionedCredential {
    pub resource_id: ResourceId,
    pub username: String,
    pub password: SecretString,
}

/// External provisioning collaborator for dynamic credentials
#[async_trait]
pub trait CredentialUpstream: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    async fn provision(&self, role: &Role, ttl: Duration) -> Result<ProvisionedCredential, UpstreamError>;

    /// Extend the upstream validity of a credential after a lease renewal
    async fn refresh(&self, resource_id: &ResourceId, ttl: Duration) -> Result<(), UpstreamError>;

    /// Destroy the credential. Must succeed for resources already gone.
    async fn teardown(&self, resource_id: &ResourceId) -> Result<(), UpstreamError>;
}

/// Run an upstream call under `limit`, recording its outcome on `metrics`.
///
/// Elapsing the limit yields `UpstreamTimeout` and drops the call. The
/// upstream's own error is passed back untouched so the caller can map it to
/// the right taxonomy code.
pub async fn bounded<T, F>(
    metrics: &MetricsRecorder,
    operation: &str,
    limit: Duration,
    call: F,
) -> BackendResult<Result<T, UpstreamError>>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(limit, call).await;
    let status = match &outcome {
        Err(_) => "timeout",
        Ok(Err(_)) => "error",
        Ok(Ok(_)) => "ok",
    };
    metrics.record_upstream_call(operation, status, start.elapsed());

    outcome.map_err(|_| {
        tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "Upstream call timed out");
        BackendError::upstream_timeout(operation, limit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through_results() {
        let metrics = MetricsRecorder::new();
        let ok = bounded(&metrics, "provision", Duration::from_secs(1), async { Ok::<_, UpstreamError>(7) }).await;
        assert_eq!(ok.unwrap(), Ok(7));

        let failed = bounded(&metrics, "teardown", Duration::from_secs(1), async {
            Err::<(), _>(UpstreamError::Unavailable("down".into()))
        })
        .await;
        assert_eq!(failed.unwrap(), Err(UpstreamError::Unavailable("down".into())));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded(&MetricsRecorder::new(), "provision", Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, UpstreamError>(())
        })
        .await
        .unwrap_err();

        assert_eq!(err, BackendError::upstream_timeout("provision", Duration::from_millis(100)));
    }
}
