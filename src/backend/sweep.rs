//! Expiry sweep and tombstone cleanup.

use std::time::Duration;

use chrono::TimeDelta;
use tracing::{debug, info, warn};

use super::Backend;
use crate::handlers::{RevokeTrigger, SecretHandler};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired leases found
    pub examined: usize,
    pub revoked: usize,
    /// Revocations that failed and stay pending for the next pass
    pub failed: usize,
}

impl Backend {
    /// Revoke every lease that expired more than `grace` ago.
    ///
    /// Each lease goes through its owning handler so external resources are
    /// torn down first. A failed teardown leaves the lease in place and the
    /// next pass retries it.
    pub async fn sweep(&self, grace: Duration) -> SweepReport {
        let leases = &self.ctx.leases;
        let now = leases.now();
        let cutoff = TimeDelta::from_std(grace).ok().and_then(|grace| now.checked_sub_signed(grace)).unwrap_or(now);

        let expired = leases.list_expired(cutoff);
        let mut report = SweepReport { examined: expired.len(), ..SweepReport::default() };

        for lease in expired {
            let handler = SecretHandler::for_type(lease.secret_ref.secret_type);
            match handler.revoke(&self.ctx, &lease.id, RevokeTrigger::Sweep).await {
                Ok(_) => {
                    report.revoked += 1;
                    debug!(lease_id = %lease.id, expired_at = %lease.expires_at, "Swept expired lease");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(lease_id = %lease.id, error = %err, "Failed to revoke expired lease");
                }
            }
        }

        self.ctx.metrics.record_sweep(report.revoked, report.failed);
        self.ctx.metrics.update_lease_counts(leases.len(), leases.active_count());
        if report.examined > 0 {
            info!(
                examined = report.examined,
                revoked = report.revoked,
                failed = report.failed,
                "Lease sweep completed"
            );
        }
        report
    }

    /// Drop revoked lease records older than `retention`
    pub fn purge_tombstones(&self, retention: Duration) -> usize {
        let leases = &self.ctx.leases;
        let now = leases.now();
        let older_than = TimeDelta::from_std(retention).ok().and_then(|r| now.checked_sub_signed(r)).unwrap_or(now);

        let purged = leases.purge_revoked(older_than);
        self.ctx.metrics.record_tombstones_purged(purged);
        if purged > 0 {
            debug!(purged, "Purged revoked lease records");
        }
        purged
    }
}
