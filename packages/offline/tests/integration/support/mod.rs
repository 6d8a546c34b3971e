use std::sync::Arc;
use std::time::Duration;

use common::storage::FilesystemKvEngine;
use offline::{BlobStore, RecordStore, RetentionSweeper};
use tempfile::TempDir;

/// Scratch directory holding both stores for one test.
pub struct TestStores {
    pub _dir: TempDir,
    pub drafts: Arc<RecordStore<FilesystemKvEngine>>,
    pub files: BlobStore,
}

pub async fn open_drafts(
    dir: &TempDir,
    quota_bytes: u64,
    window: Duration,
) -> Arc<RecordStore<FilesystemKvEngine>> {
    let engine = FilesystemKvEngine::new(dir.path().join("drafts"), quota_bytes)
        .await
        .expect("Failed to open draft engine");
    Arc::new(RecordStore::new(
        Arc::new(engine),
        RetentionSweeper::new(window),
    ))
}

pub async fn open_files(dir: &TempDir) -> BlobStore {
    let store = BlobStore::new(dir.path().join("files.db"));
    store
        .initialize()
        .await
        .expect("Failed to initialize blob store");
    store
}

pub async fn setup() -> TestStores {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let drafts = open_drafts(&dir, 0, offline::DEFAULT_RETENTION_WINDOW).await;
    let files = open_files(&dir).await;
    TestStores {
        _dir: dir,
        drafts,
        files,
    }
}
