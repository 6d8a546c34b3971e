use thiserror::Error;

/// Errors that can occur during draft or staged-file storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The engine refused a write because its byte quota (or the disk) is full.
    #[error("storage capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The requested record does not exist (never stored, deleted or evicted).
    #[error("record not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("corrupt record '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// The underlying engine could not be opened or is not initialized.
    #[error("storage engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Any other engine-level failure.
    #[error("storage engine error: {0}")]
    Engine(String),

    #[error("storage IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether the failure is a quota/disk-full condition that a sweep may relieve.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull => Self::CapacityExceeded(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(feature = "sea-orm")]
impl From<sea_orm::DbErr> for StorageError {
    fn from(err: sea_orm::DbErr) -> Self {
        let message = err.to_string();
        // SQLITE_FULL surfaces only through the driver message.
        if message.contains("database or disk is full") {
            return Self::CapacityExceeded(message);
        }
        match err {
            sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_) => {
                Self::EngineUnavailable(message)
            }
            _ => Self::Engine(message),
        }
    }
}
