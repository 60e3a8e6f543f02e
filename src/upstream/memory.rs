use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::debug;

use super::{CredentialUpstream, ProvisionedCredential, UpstreamError};
use crate::domain::{ResourceId, Role, SecretString};

const PASSWORD_LEN: usize = 32;

#[derive(Debug, Clone)]
struct Account {
    username: String,
    role: String,
    valid_until: DateTime<Utc>,
}

/// Upstream that keeps accounts in process memory
#[derive(Debug, Default)]
pub struct InMemoryUpstream {
    accounts: DashMap<ResourceId, Account>,
}

impl InMemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn has_account(&self, resource_id: &ResourceId) -> bool {
        self.accounts.contains_key(resource_id)
    }

    /// Username of a live account
    pub fn username(&self, resource_id: &ResourceId) -> Option<String> {
        self.accounts.get(resource_id).map(|a| a.username.clone())
    }

    /// When the upstream itself will consider the account lapsed
    pub fn valid_until_of(&self, resource_id: &ResourceId) -> Option<DateTime<Utc>> {
        self.accounts.get(resource_id).map(|a| a.valid_until)
    }

    fn valid_until(ttl: Duration) -> DateTime<Utc> {
        chrono::TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn generate_password() -> String {
    OsRng.sample_iter(&Alphanumeric).take(PASSWORD_LEN).map(char::from).collect()
}

#[async_trait]
impl CredentialUpstream for InMemoryUpstream {
    fn name(&self) -> &str {
        "memory"
    }

    async fn provision(&self, role: &Role, ttl: Duration) -> Result<ProvisionedCredential, UpstreamError> {
        let resource_id = ResourceId::generate();
        let suffix: String = resource_id.as_str().chars().filter(|c| *c != '-').take(8).collect();
        let username = format!("{}-{}-{}", role.username_prefix, role.name, suffix);

        self.accounts.insert(
            resource_id.clone(),
            Account { username: username.clone(), role: role.name.clone(), valid_until: Self::valid_until(ttl) },
        );
        debug!(resource_id = %resource_id, role = %role.name, "Provisioned in-memory account");

        Ok(ProvisionedCredential { resource_id, username, password: SecretString::new(generate_password()) })
    }

    async fn refresh(&self, resource_id: &ResourceId, ttl: Duration) -> Result<(), UpstreamError> {
        let mut account =
            self.accounts.get_mut(resource_id).ok_or_else(|| UpstreamError::NotFound(resource_id.to_string()))?;
        account.valid_until = Self::valid_until(ttl);
        Ok(())
    }

    async fn teardown(&self, resource_id: &ResourceId) -> Result<(), UpstreamError> {
        if let Some((_, account)) = self.accounts.remove(resource_id) {
            debug!(resource_id = %resource_id, role = %account.role, "Removed in-memory account");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> Role {
        Role {
            name: "dev".into(),
            ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(120),
            renewable: true,
            username_prefix: "v".into(),
        }
    }

    #[tokio::test]
    async fn test_provision_and_teardown() {
        let upstream = InMemoryUpstream::new();
        let cred = upstream.provision(&role(), Duration::from_secs(60)).await.unwrap();

        assert!(cred.username.starts_with("v-dev-"));
        assert_eq!(cred.password.len(), PASSWORD_LEN);
        assert!(upstream.has_account(&cred.resource_id));

        let before = upstream.valid_until_of(&cred.resource_id).unwrap();
        upstream.refresh(&cred.resource_id, Duration::from_secs(30)).await.unwrap();
        assert!(upstream.valid_until_of(&cred.resource_id).unwrap() < before);
        upstream.teardown(&cred.resource_id).await.unwrap();
        assert_eq!(upstream.account_count(), 0);

        // Teardown of a missing account still succeeds, refresh does not
        upstream.teardown(&cred.resource_id).await.unwrap();
        assert!(matches!(
            upstream.refresh(&cred.resource_id, Duration::from_secs(30)).await,
            Err(UpstreamError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_passwords_are_unique() {
        let upstream = InMemoryUpstream::new();
        let a = upstream.provision(&role(), Duration::from_secs(60)).await.unwrap();
        let b = upstream.provision(&role(), Duration::from_secs(60)).await.unwrap();
        assert_ne!(a.password.expose_secret(), b.password.expose_secret());
        assert_ne!(a.username, b.username);
    }
}
