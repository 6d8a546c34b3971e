pub mod config;
pub mod draft;
pub mod file;
pub mod storage;

pub use config::{AutoSaveConfig, OfflineAppConfig, RetentionConfig, StorageConfig};
pub use draft::DraftRecord;
pub use file::{FileBlob, FileId, FileRecord};
pub use storage::{KeyValueEngine, StorageError};
