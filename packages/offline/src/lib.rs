//! Offline draft persistence and file staging.
//!
//! [`RecordStore`] keeps small JSON drafts per job, [`BlobStore`] keeps staged
//! attachments, [`RetentionSweeper`] evicts aged-out entries from both, and
//! [`AutoSaveController`] periodically writes a bound form through to the
//! record store.

pub mod autosave;
pub mod blob_store;
pub mod entity;
pub mod record_store;
pub mod retention;

pub use autosave::{AutoSaveController, DEFAULT_AUTOSAVE_INTERVAL, DraftSource};
pub use blob_store::BlobStore;
pub use record_store::{RecordStore, RecordStoreStats};
pub use retention::{DEFAULT_RETENTION_WINDOW, RetentionSweeper, SweepReport};

pub use common::{
    DraftRecord, FileBlob, FileId, FileRecord, KeyValueEngine, OfflineAppConfig, StorageError,
};
