//! # Structured Logging
//!
//! Subscriber setup and span macros. Logs always go to stderr: stdout belongs
//! to the plugin handshake line.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Create a tracing span for a dispatched request.
///
/// ```rust,ignore
/// let span = request_span!(request.operation(), request.path());
/// ```
#[macro_export]
macro_rules! request_span {
    ($operation:expr, $path:expr) => {
        tracing::info_span!(
            "backend_request",
            operation = %$operation,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            lease_id = tracing::field::Empty
        )
    };
    ($operation:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "backend_request",
            operation = %$operation,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            lease_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Create a tracing span for a lease lifecycle step.
///
/// ```rust,ignore
/// let span = lease_span!("revoke", lease.id);
/// ```
#[macro_export]
macro_rules! lease_span {
    ($operation:expr, $lease_id:expr) => {
        tracing::debug_span!(
            "lease_operation",
            operation = %$operation,
            lease_id = %$lease_id
        )
    };
    ($operation:expr, $lease_id:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "lease_operation",
            operation = %$operation,
            lease_id = %$lease_id,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.log_level)?,
    };

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(true);
    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Filter built from the configured log level directives
fn level_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level).map_err(|e| Error::config(format!("Invalid log level '{}': {}", log_level, e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::Config) {
    tracing::info!(
        transport_address = %config.transport.bind_address(),
        default_ttl_secs = config.lease.default_ttl_seconds,
        max_ttl_secs = config.lease.max_ttl_seconds,
        sweep_interval_secs = config.lease.sweep_interval_seconds,
        upstream_timeout_ms = config.upstream.timeout_ms,
        metrics_enabled = %config.observability.enable_metrics,
        "vaultplane backend configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert!(level_filter("info").is_ok());
        assert!(level_filter("vaultplane=debug,tower_http=warn").is_ok());
        assert!(matches!(level_filter("vaultplane=loud"), Err(Error::Config(_))));
    }

    #[test]
    fn test_macros_compile() {
        let _span = request_span!("create", "creds/dev");
        let _span = request_span!("renew", "leases/creds/dev/1", attempt = 2);
        let _span = lease_span!("revoke", "creds/dev/1");
        let _span = lease_span!("renew", "creds/dev/1", clamped = true);
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::Config::default();

        // This should not panic
        log_config_info(&config);
    }
}
