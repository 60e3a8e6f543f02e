//! # Configuration Management
//!
//! Configuration is layered: built-in defaults, then an optional TOML/YAML/JSON
//! file, then `VAULTPLANE_*` environment variables. Nested keys use a double
//! underscore, e.g. `VAULTPLANE_LEASE__MAX_TTL_SECONDS=7200`.

pub mod settings;

use std::path::Path;

pub use settings::{Config, LeaseConfig, ObservabilityConfig, TransportConfig, UpstreamConfig};

use crate::errors::Result;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VAULTPLANE";

impl Config {
    /// Load and validate configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}
