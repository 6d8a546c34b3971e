use async_trait::async_trait;

use super::error::StorageError;

/// Durable string key/value storage with an optional byte quota.
///
/// Each engine serializes its own writes; callers need no extra locking.
#[async_trait]
pub trait KeyValueEngine: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Fails with [`StorageError::CapacityExceeded`] when the write would not fit.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`.
    ///
    /// Returns `true` if a value was removed, `false` if it did not exist.
    async fn remove_item(&self, key: &str) -> Result<bool, StorageError>;

    /// Bytes currently accounted against the quota.
    async fn usage_bytes(&self) -> u64;
}
