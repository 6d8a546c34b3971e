use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::KeyValueEngine;

/// In-process key/value engine.
///
/// Usage is counted as key plus value bytes. Nothing survives the process;
/// intended for tests and sessions that opt out of durability.
#[derive(Default)]
pub struct MemoryKvEngine {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: u64,
}

impl MemoryKvEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that rejects writes pushing usage above `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            items: RwLock::default(),
            quota_bytes,
        }
    }

    fn entry_size(key: &str, value: &str) -> u64 {
        (key.len() + value.len()) as u64
    }
}

#[async_trait]
impl KeyValueEngine for MemoryKvEngine {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().await;

        if self.quota_bytes > 0 {
            let used: u64 = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| Self::entry_size(k, v))
                .sum();
            let projected = used + Self::entry_size(key, value);
            if projected > self.quota_bytes {
                return Err(StorageError::CapacityExceeded(format!(
                    "writing '{key}' needs {projected} bytes, quota is {}",
                    self.quota_bytes
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.items.write().await.remove(key).is_some())
    }

    async fn usage_bytes(&self) -> u64 {
        self.items
            .read()
            .await
            .iter()
            .map(|(k, v)| Self::entry_size(k, v))
            .sum()
    }
}
