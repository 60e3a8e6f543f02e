//! # Metrics Collection
//!
//! Prometheus metrics for request dispatch, lease lifecycle, upstream calls,
//! and the expiry sweep. Recording is a no-op until [`init_metrics`] installs
//! an exporter.

use std::net::SocketAddr;
use std::time::Duration;

use ::tracing::{info, warn};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Metrics recorder that tracks backend metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a dispatched request and its outcome code ("ok" on success)
    pub fn record_request(&self, operation: &str, outcome: &str, duration: Duration) {
        let labels = [("operation", operation.to_string()), ("outcome", outcome.to_string())];
        counter!("backend_requests_total", &labels).increment(1);

        let duration_labels = [("operation", operation.to_string())];
        histogram!("backend_request_duration_seconds", &duration_labels).record(duration.as_secs_f64());
    }

    /// Record a warning attached to a response
    pub fn record_warning(&self, code: &str) {
        let labels = [("code", code.to_string())];
        counter!("backend_warnings_total", &labels).increment(1);
    }

    /// Record a handler panic caught by the dispatcher
    pub fn record_panic(&self) {
        counter!("backend_handler_panics_total").increment(1);
    }

    pub fn record_lease_issued(&self, secret_type: &str) {
        let labels = [("secret_type", secret_type.to_string())];
        counter!("leases_issued_total", &labels).increment(1);
    }

    pub fn record_lease_renewed(&self, secret_type: &str, clamped: bool) {
        let labels = [("secret_type", secret_type.to_string()), ("clamped", clamped.to_string())];
        counter!("leases_renewed_total", &labels).increment(1);
    }

    /// Record a revocation; `trigger` is "request" or "sweep"
    pub fn record_lease_revoked(&self, secret_type: &str, trigger: &str) {
        let labels = [("secret_type", secret_type.to_string()), ("trigger", trigger.to_string())];
        counter!("leases_revoked_total", &labels).increment(1);
    }

    /// Update the outstanding lease gauges
    pub fn update_lease_counts(&self, tracked: usize, active: usize) {
        gauge!("leases_tracked").set(tracked as f64);
        gauge!("leases_active").set(active as f64);
    }

    /// Record an upstream call; `status` is "ok", "error", or "timeout"
    pub fn record_upstream_call(&self, operation: &str, status: &str, duration: Duration) {
        let labels = [("operation", operation.to_string()), ("status", status.to_string())];
        counter!("upstream_calls_total", &labels).increment(1);

        let duration_labels = [("operation", operation.to_string())];
        histogram!("upstream_call_duration_seconds", &duration_labels).record(duration.as_secs_f64());
    }

    /// Record one sweep pass
    pub fn record_sweep(&self, revoked: usize, failed: usize) {
        counter!("lease_sweeps_total").increment(1);
        counter!("lease_sweep_revoked_total").increment(revoked as u64);
        counter!("lease_sweep_failed_total").increment(failed as u64);
    }

    pub fn record_tombstones_purged(&self, purged: usize) {
        counter!("lease_tombstones_purged_total").increment(purged as u64);
    }

    /// Register metric descriptions with the exporter
    pub fn register_metrics(&self) {
        describe_counter!("backend_requests_total", Unit::Count, "Requests dispatched by operation and outcome");
        describe_histogram!(
            "backend_request_duration_seconds",
            Unit::Seconds,
            "Time from request decode to response"
        );
        describe_counter!("backend_warnings_total", Unit::Count, "Warnings attached to responses");
        describe_counter!("backend_handler_panics_total", Unit::Count, "Handler panics converted to errors");
        describe_counter!("leases_issued_total", Unit::Count, "Leases issued by secret type");
        describe_counter!("leases_renewed_total", Unit::Count, "Lease renewals by secret type");
        describe_counter!("leases_revoked_total", Unit::Count, "Lease revocations by trigger");
        describe_gauge!("leases_tracked", Unit::Count, "Lease records held in the store");
        describe_gauge!("leases_active", Unit::Count, "Leases neither revoked nor expired");
        describe_counter!("upstream_calls_total", Unit::Count, "Upstream calls by status");
        describe_histogram!("upstream_call_duration_seconds", Unit::Seconds, "Upstream call latency");
        describe_counter!("lease_sweeps_total", Unit::Count, "Expiry sweep passes");
        describe_counter!("lease_sweep_revoked_total", Unit::Count, "Expired leases revoked by the sweep");
        describe_counter!("lease_sweep_failed_total", Unit::Count, "Sweep revocations that failed");
        describe_counter!("lease_tombstones_purged_total", Unit::Count, "Revoked leases purged");
    }
}

/// Initialize metrics collection and Prometheus exporter
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr
        .parse()
        .map_err(|e| Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().register_metrics();

    info!(metrics_addr = %metrics_addr, service_name = %config.service_name, "Metrics collection initialized");

    Ok(())
}
