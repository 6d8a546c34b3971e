use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::draft::{DRAFT_INDEX_KEY, draft_key};
use common::{DraftRecord, KeyValueEngine, StorageError};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::retention::RetentionSweeper;

/// Counters of capacity recoveries performed by a [`RecordStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStoreStats {
    /// Sweeps triggered by a capacity failure.
    pub capacity_sweeps: u64,
    /// Writes retried after such a sweep.
    pub capacity_retries: u64,
}

/// Draft persistence over a [`KeyValueEngine`].
///
/// Drafts live under `draft:<job_id>`; the ordered list of known job ids
/// lives under a single index key. Record and index are written separately,
/// so the index may name a record that no longer exists. Reads treat such
/// entries as absent and sweeps drop them.
pub struct RecordStore<E: ?Sized> {
    sweeper: RetentionSweeper,
    capacity_sweeps: AtomicU64,
    capacity_retries: AtomicU64,
    engine: Arc<E>,
}

impl<E: KeyValueEngine + ?Sized> RecordStore<E> {
    pub fn new(engine: Arc<E>, sweeper: RetentionSweeper) -> Self {
        Self {
            sweeper,
            capacity_sweeps: AtomicU64::new(0),
            capacity_retries: AtomicU64::new(0),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        self.sweeper
    }

    pub fn stats(&self) -> RecordStoreStats {
        RecordStoreStats {
            capacity_sweeps: self.capacity_sweeps.load(Ordering::Relaxed),
            capacity_retries: self.capacity_retries.load(Ordering::Relaxed),
        }
    }

    /// Store `data` as the draft for `job_id`, replacing any previous draft.
    ///
    /// A capacity failure of either the record or its index entry triggers
    /// one retention sweep and exactly one retry of both. If the retry fails
    /// too, the error is returned and nothing is left behind.
    pub async fn put(&self, job_id: &str, data: Value) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(&DraftRecord::new(job_id, data))?;

        match self.write_draft(job_id, &serialized).await {
            Ok(()) => {}
            Err(e) if e.is_capacity() => {
                warn!(job_id, error = %e, "Draft write hit capacity, sweeping before retry");

                self.capacity_sweeps.fetch_add(1, Ordering::Relaxed);
                if let Err(sweep_err) = self.sweeper.sweep_drafts(self).await {
                    warn!(job_id, error = %sweep_err, "Capacity sweep failed");
                }

                self.capacity_retries.fetch_add(1, Ordering::Relaxed);
                if let Err(retry_err) = self.write_draft(job_id, &serialized).await {
                    error!(job_id, error = %retry_err, "Draft write failed after sweep");
                    return Err(retry_err);
                }
            }
            Err(e) => return Err(e),
        }

        debug!(job_id, bytes = serialized.len(), "Stored draft");
        Ok(())
    }

    /// Write the record, then make sure the index names it.
    ///
    /// The index is only rewritten when `job_id` is new to it, so a failed
    /// index write means no indexed draft existed and the record is removed
    /// again rather than left unreachable by sweeps.
    async fn write_draft(&self, job_id: &str, serialized: &str) -> Result<(), StorageError> {
        self.engine.set_item(&draft_key(job_id), serialized).await?;

        if let Err(e) = self.insert_into_index(job_id).await {
            if let Err(rollback_err) = self.remove_record(job_id).await {
                warn!(job_id, error = %rollback_err, "Could not roll back unindexed draft");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Payload of the draft for `job_id`, if one exists and parses.
    pub async fn get(&self, job_id: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get_record(job_id).await?.map(|record| record.data))
    }

    /// Full draft record for `job_id`. Corrupt entries read as `None`.
    pub async fn get_record(&self, job_id: &str) -> Result<Option<DraftRecord>, StorageError> {
        let key = draft_key(job_id);
        let raw = match self.engine.get_item(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(StorageError::Corrupt { reason, .. }) => {
                warn!(job_id, reason, "Ignoring undecodable draft");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<DraftRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(job_id, error = %e, "Ignoring unparseable draft");
                Ok(None)
            }
        }
    }

    /// Remove the draft for `job_id` and its index entry. Idempotent.
    pub async fn delete(&self, job_id: &str) -> Result<(), StorageError> {
        self.remove_record(job_id).await?;
        self.remove_from_index(job_id).await
    }

    /// Job ids in the draft index, as recorded.
    ///
    /// Backing records are not checked; an unreadable index reads as empty.
    pub async fn list_known_keys(&self) -> Result<Vec<String>, StorageError> {
        let raw = match self.engine.get_item(DRAFT_INDEX_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Vec::new()),
            Err(StorageError::Corrupt { reason, .. }) => {
                warn!(reason, "Draft index undecodable, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(keys) => Ok(keys),
            Err(e) => {
                warn!(error = %e, "Draft index unparseable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub(crate) async fn remove_record(&self, job_id: &str) -> Result<bool, StorageError> {
        self.engine.remove_item(&draft_key(job_id)).await
    }

    pub(crate) async fn replace_index(&self, job_ids: &[String]) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(job_ids)?;
        self.engine.set_item(DRAFT_INDEX_KEY, &serialized).await
    }

    async fn insert_into_index(&self, job_id: &str) -> Result<(), StorageError> {
        let mut keys = self.list_known_keys().await?;
        if keys.iter().any(|k| k == job_id) {
            return Ok(());
        }
        keys.push(job_id.to_string());
        self.replace_index(&keys).await
    }

    async fn remove_from_index(&self, job_id: &str) -> Result<(), StorageError> {
        let keys = self.list_known_keys().await?;
        if !keys.iter().any(|k| k == job_id) {
            return Ok(());
        }
        let remaining: Vec<String> = keys.into_iter().filter(|k| k != job_id).collect();
        self.replace_index(&remaining).await
    }
}
