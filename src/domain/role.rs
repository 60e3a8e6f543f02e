use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::seconds;

/// Credential role: the template upstream credentials are provisioned from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(with = "seconds")]
    pub ttl: Duration,
    #[serde(with = "seconds")]
    pub max_ttl: Duration,
    pub renewable: bool,
    pub username_prefix: String,
}

impl Role {
    pub const DEFAULT_USERNAME_PREFIX: &'static str = "v";
}
