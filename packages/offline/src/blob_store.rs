use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{FileBlob, FileId, FileRecord, StorageError};
use sea_orm::{
    ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::entity::staged_file;
use crate::retention::cutoff_for;

/// Local store for staged file attachments.
///
/// Backed by a SQLite database with secondary indexes on `job_id` and on the
/// creation time. Must be opened with [`BlobStore::initialize`] before use.
pub struct BlobStore {
    path: PathBuf,
    max_connections: u32,
    db: OnceCell<DatabaseConnection>,
}

impl BlobStore {
    /// Describe a store at `path`. Nothing is opened until `initialize`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 4,
            db: OnceCell::new(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Open the database and sync its schema (table plus both indexes).
    ///
    /// Idempotent and safe to call concurrently: only the first call opens,
    /// later and racing calls get the same handle.
    pub async fn initialize(&self) -> Result<&DatabaseConnection, StorageError> {
        self.db.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> Result<DatabaseConnection, StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = format!("sqlite://{}?mode=rwc", self.path.display());
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(self.max_connections)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(|e| StorageError::EngineUnavailable(e.to_string()))?;
        db.get_schema_registry("offline::entity::*")
            .sync(&db)
            .await?;

        info!(path = %self.path.display(), "Opened staged file store");
        Ok(db)
    }

    fn connection(&self) -> Result<&DatabaseConnection, StorageError> {
        self.db.get().ok_or_else(|| {
            StorageError::EngineUnavailable("staged file store is not initialized".into())
        })
    }

    /// Stage `blob` for `(job_id, attribute_id)` and return its new id.
    ///
    /// Engine failures are returned as-is; there is no retry.
    pub async fn put(
        &self,
        job_id: &str,
        attribute_id: &str,
        blob: FileBlob,
    ) -> Result<FileId, StorageError> {
        self.insert(job_id, attribute_id, blob, Utc::now()).await
    }

    async fn insert(
        &self,
        job_id: &str,
        attribute_id: &str,
        blob: FileBlob,
        staged_at: DateTime<Utc>,
    ) -> Result<FileId, StorageError> {
        let db = self.connection()?;
        let file_id = FileId::generate(job_id, attribute_id, staged_at);
        let size_bytes = i64::try_from(blob.size_bytes()).unwrap_or(i64::MAX);

        let model = staged_file::ActiveModel {
            id: Set(file_id.as_str().to_owned()),
            job_id: Set(job_id.to_owned()),
            attribute_id: Set(attribute_id.to_owned()),
            name: Set(blob.name),
            mime_type: Set(blob.mime_type),
            size_bytes: Set(size_bytes),
            data: Set(blob.bytes),
            staged_at: Set(staged_at.timestamp_millis()),
        };
        staged_file::Entity::insert(model)
            .exec_without_returning(db)
            .await?;

        debug!(%file_id, job_id, attribute_id, size_bytes, "Staged file");
        Ok(file_id)
    }

    /// Payload of a staged file.
    ///
    /// Fails with [`StorageError::NotFound`] when the id never existed or was
    /// evicted; an empty attachment is returned as an empty blob.
    pub async fn get(&self, file_id: &FileId) -> Result<FileBlob, StorageError> {
        Ok(self.get_record(file_id).await?.blob)
    }

    /// Staged file with its owner and timestamp.
    pub async fn get_record(&self, file_id: &FileId) -> Result<FileRecord, StorageError> {
        let db = self.connection()?;
        staged_file::Entity::find_by_id(file_id.as_str())
            .one(db)
            .await?
            .map(into_record)
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))
    }

    /// Remove one staged file. Idempotent.
    pub async fn delete(&self, file_id: &FileId) -> Result<(), StorageError> {
        let db = self.connection()?;
        let result = staged_file::Entity::delete_by_id(file_id.as_str())
            .exec(db)
            .await?;
        debug!(%file_id, removed = result.rows_affected, "Deleted staged file");
        Ok(())
    }

    /// Files staged for `(job_id, attribute_id)`, oldest first.
    ///
    /// Scans the `job_id` index and filters by attribute in memory; there is
    /// no compound index, so cost grows with the number of files per job.
    pub async fn list_for_job_and_attribute(
        &self,
        job_id: &str,
        attribute_id: &str,
    ) -> Result<Vec<FileRecord>, StorageError> {
        let db = self.connection()?;
        let rows = staged_file::Entity::find()
            .filter(staged_file::Column::JobId.eq(job_id))
            .order_by_asc(staged_file::Column::StagedAt)
            .order_by_asc(staged_file::Column::Id)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .filter(|row| row.attribute_id == attribute_id)
            .map(into_record)
            .collect())
    }

    /// Delete every file staged strictly before `now - window`.
    ///
    /// Walks the timestamp index with a keyset cursor over `(staged_at, id)`.
    /// The next row is fetched only after the current one is deleted, so
    /// deletions never cause a skip or a repeat. Returns the number removed.
    pub async fn sweep_older_than(&self, window: Duration) -> Result<usize, StorageError> {
        let db = self.connection()?;
        let cutoff_ms = cutoff_for(window).timestamp_millis();
        let mut position: Option<(i64, String)> = None;
        let mut removed = 0usize;

        loop {
            let mut query = staged_file::Entity::find()
                .select_only()
                .column(staged_file::Column::StagedAt)
                .column(staged_file::Column::Id)
                .filter(staged_file::Column::StagedAt.lt(cutoff_ms))
                .order_by_asc(staged_file::Column::StagedAt)
                .order_by_asc(staged_file::Column::Id);

            if let Some((at, id)) = &position {
                query = query.filter(
                    Condition::any()
                        .add(staged_file::Column::StagedAt.gt(*at))
                        .add(
                            Condition::all()
                                .add(staged_file::Column::StagedAt.eq(*at))
                                .add(staged_file::Column::Id.gt(id.as_str())),
                        ),
                );
            }

            let Some((staged_at, id)) = query.into_tuple::<(i64, String)>().one(db).await? else {
                break;
            };

            let result = staged_file::Entity::delete_by_id(id.as_str())
                .exec(db)
                .await?;
            removed += result.rows_affected as usize;
            position = Some((staged_at, id));
        }

        info!(removed, window_secs = window.as_secs(), "Swept staged files");
        Ok(removed)
    }

    /// Number of files currently staged.
    pub async fn count(&self) -> Result<usize, StorageError> {
        let db = self.connection()?;
        let rows = staged_file::Entity::find().count(db).await?;
        Ok(usize::try_from(rows).unwrap_or(usize::MAX))
    }

    /// Close the connection pool.
    pub async fn close(self) -> Result<(), StorageError> {
        if let Some(db) = self.db.into_inner() {
            db.close().await?;
        }
        Ok(())
    }
}

fn into_record(model: staged_file::Model) -> FileRecord {
    FileRecord {
        file_id: FileId::from(model.id),
        job_id: model.job_id,
        attribute_id: model.attribute_id,
        blob: FileBlob {
            name: model.name,
            mime_type: model.mime_type,
            bytes: model.data,
        },
        timestamp: DateTime::<Utc>::from_timestamp_millis(model.staged_at).unwrap_or_default(),
    }
}
