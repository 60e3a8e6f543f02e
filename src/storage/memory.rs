use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;

use super::Storage;
use crate::errors::BackendResult;

/// In-process storage backed by an ordered map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> BackendResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    #[instrument(skip(self, value), name = "storage_put")]
    async fn put(&self, key: &str, value: Value) -> BackendResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    #[instrument(skip(self), name = "storage_delete")]
    async fn delete(&self, key: &str) -> BackendResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key[prefix.len()..].to_string())
            .collect())
    }
}
