//! Role repository on top of [`Storage`].

use std::sync::Arc;

use tracing::instrument;

use super::{Storage, ROLE_PREFIX};
use crate::domain::Role;
use crate::errors::{BackendError, BackendResult};

#[derive(Debug, Clone)]
pub struct RoleRepository {
    storage: Arc<dyn Storage>,
}

impl RoleRepository {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn key(name: &str) -> String {
        format!("{}{}", ROLE_PREFIX, name)
    }

    pub async fn get(&self, name: &str) -> BackendResult<Option<Role>> {
        match self.storage.get(&Self::key(name)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| BackendError::internal(format!("Stored role '{}' is corrupt: {}", name, e))),
            None => Ok(None),
        }
    }

    /// Fetch a role, failing with `NotFound` when absent
    pub async fn require(&self, name: &str) -> BackendResult<Role> {
        self.get(name).await?.ok_or_else(|| BackendError::not_found("role", name))
    }

    #[instrument(skip(self, role), fields(role = %role.name))]
    pub async fn put(&self, role: &Role) -> BackendResult<()> {
        let value = serde_json::to_value(role)
            .map_err(|e| BackendError::internal(format!("Failed to encode role: {}", e)))?;
        self.storage.put(&Self::key(&role.name), value).await
    }

    pub async fn delete(&self, name: &str) -> BackendResult<bool> {
        self.storage.delete(&Self::key(name)).await
    }

    /// Role names in order
    pub async fn list(&self) -> BackendResult<Vec<String>> {
        self.storage.list(ROLE_PREFIX).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    fn role(name: &str) -> Role {
        Role {
            name: name.to_string(),
            ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(120),
            renewable: true,
            username_prefix: Role::DEFAULT_USERNAME_PREFIX.to_string(),
        }
    }

    #[tokio::test]
    async fn test_role_crud() {
        let repo = RoleRepository::new(Arc::new(MemoryStorage::new()));
        repo.put(&role("dev")).await.unwrap();
        repo.put(&role("admin")).await.unwrap();

        assert_eq!(repo.require("dev").await.unwrap(), role("dev"));
        assert_eq!(repo.list().await.unwrap(), vec!["admin", "dev"]);

        assert!(repo.delete("dev").await.unwrap());
        let err = repo.require("dev").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }
}
