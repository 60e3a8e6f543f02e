//! # Observability Infrastructure
//!
//! Structured logging and metrics collection for the backend.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize all observability components
pub async fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;

    if config.enable_metrics {
        init_metrics(config).await?;
    }

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        metrics_enabled = %config.enable_metrics,
        "Observability initialized successfully"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[tokio::test]
    async fn test_invalid_log_level_is_config_error() {
        // RUST_LOG takes precedence over the configured level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }

        let config = ObservabilityConfig {
            log_level: "vaultplane=loud".to_string(),
            enable_metrics: false,
            ..Default::default()
        };

        let result = init_observability(&config).await;
        assert!(matches!(result, Err(Error::Config(message)) if message.contains("vaultplane=loud")));
    }
}
