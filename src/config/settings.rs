//! # Configuration Settings
//!
//! Defines the configuration structure for the vaultplane backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Transport adapter configuration
    #[validate(nested)]
    pub transport: TransportConfig,

    /// Lease TTL bounds and sweep schedule
    #[validate(nested)]
    pub lease: LeaseConfig,

    /// Upstream provisioning configuration
    #[validate(nested)]
    pub upstream: UpstreamConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    /// Cross-field checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.lease.default_ttl_seconds > self.lease.max_ttl_seconds {
            return Err(Error::config(format!(
                "lease.default_ttl_seconds ({}) must not exceed lease.max_ttl_seconds ({})",
                self.lease.default_ttl_seconds, self.lease.max_ttl_seconds
            )));
        }

        if self.observability.enable_metrics
            && self.transport.port != 0
            && self.transport.port == self.observability.metrics_port
        {
            return Err(Error::config("Transport and metrics ports cannot be the same"));
        }

        Ok(())
    }
}

/// Transport adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransportConfig {
    /// Bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Listen port (0 = pick a free port and announce it in the handshake)
    pub port: u16,

    /// Requests buffered between the transport and the dispatcher
    #[validate(range(min = 1, max = 65536, message = "Request buffer must be between 1 and 65536"))]
    pub request_buffer: usize,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 0, request_buffer: 64, max_body_size: 1024 * 1024 }
    }
}

impl TransportConfig {
    /// Get the transport bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Lease defaults and sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LeaseConfig {
    /// TTL for roles and static secrets that do not set one
    #[validate(range(min = 1, message = "Default TTL must be at least 1 second"))]
    pub default_ttl_seconds: u64,

    /// Ceiling for any lease's max TTL
    #[validate(range(min = 1, message = "Max TTL must be at least 1 second"))]
    pub max_ttl_seconds: u64,

    /// Seconds between expiry sweeps (0 = no sweeping)
    pub sweep_interval_seconds: u64,

    /// Extra time a lease may sit expired before the sweep revokes it
    pub sweep_grace_seconds: u64,

    /// How long revoked leases stay queryable before they are purged
    pub tombstone_retention_seconds: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,
            max_ttl_seconds: 86400,
            sweep_interval_seconds: 30,
            sweep_grace_seconds: 0,
            tombstone_retention_seconds: 3600,
        }
    }
}

impl LeaseConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }

    /// Sweep interval (None if sweeping is disabled)
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_seconds)
    }

    pub fn tombstone_retention(&self) -> Duration {
        Duration::from_secs(self.tombstone_retention_seconds)
    }
}

/// Upstream provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Bound on every upstream call in milliseconds
    #[validate(range(
        min = 1,
        max = 300000,
        message = "Upstream timeout must be between 1ms and 300 seconds"
    ))]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Metrics server port (0 = disabled)
    pub metrics_port: u16,

    /// Service name attached to metrics
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: 9464,
            service_name: "vaultplane".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}
