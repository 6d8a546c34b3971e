use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::StorageError;
use super::traits::KeyValueEngine;

const TEMP_DIR: &str = ".tmp";

/// Filesystem-backed key/value engine.
///
/// Every key is one file named by the hex encoding of the key:
/// `{base_path}/{hex(key)}`. Writes go to `{base_path}/.tmp` first and are
/// renamed into place, so a reader never observes a half-written value.
pub struct FilesystemKvEngine {
    base_path: PathBuf,
    quota_bytes: u64,
    /// Bytes used by committed values. Held across a whole write so quota
    /// checks and renames happen one at a time.
    usage: Mutex<u64>,
}

impl FilesystemKvEngine {
    /// Open (or create) an engine rooted at `base_path`.
    ///
    /// A `quota_bytes` of zero disables the quota. Leftover temp files from an
    /// interrupted write are removed.
    pub async fn new(base_path: PathBuf, quota_bytes: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        let temp_dir = base_path.join(TEMP_DIR);
        fs::create_dir_all(&temp_dir).await?;

        let mut stale = fs::read_dir(&temp_dir).await?;
        while let Some(entry) = stale.next_entry().await? {
            let _ = fs::remove_file(entry.path()).await;
        }

        let mut usage = 0u64;
        let mut entries = fs::read_dir(&base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                usage += meta.len();
            }
        }

        debug!(path = %base_path.display(), usage, quota_bytes, "Opened filesystem kv engine");

        Ok(Self {
            base_path,
            quota_bytes,
            usage: Mutex::new(usage),
        })
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.base_path.join(hex::encode(key.as_bytes()))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn existing_len(&self, path: &Path) -> Result<u64, StorageError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueEngine for FilesystemKvEngine {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let bytes = match fs::read(self.item_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut usage = self.usage.lock().await;
        let path = self.item_path(key);
        let previous = self.existing_len(&path).await?;
        let projected = usage.saturating_sub(previous) + value.len() as u64;

        if self.quota_bytes > 0 && projected > self.quota_bytes {
            return Err(StorageError::CapacityExceeded(format!(
                "writing '{key}' needs {projected} bytes, quota is {}",
                self.quota_bytes
            )));
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, value.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        *usage = projected;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        let mut usage = self.usage.lock().await;
        let path = self.item_path(key);
        let previous = self.existing_len(&path).await?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                *usage = usage.saturating_sub(previous);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(key, error = %e, "Failed to remove kv item");
                Err(e.into())
            }
        }
    }

    async fn usage_bytes(&self) -> u64 {
        *self.usage.lock().await
    }
}
