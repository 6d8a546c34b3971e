use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Length of the random suffix that keeps ids unique under rapid inserts.
const SUFFIX_LEN: usize = 8;

/// Identifier of a staged file.
///
/// Format: `{job_id}_{attribute_id}_{created_at_ms}_{random suffix}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Generate a fresh id for a file staged at `at`.
    pub fn generate(job_id: &str, attribute_id: &str, at: DateTime<Utc>) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!(
            "{job_id}_{attribute_id}_{}_{suffix}",
            at.timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary attachment payload plus the metadata the UI supplied with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    /// Original file name.
    pub name: String,
    /// MIME content type.
    pub mime_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A staged attachment as stored locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: FileId,
    /// Owning job. Not checked against any job table.
    pub job_id: String,
    /// Category within the job, e.g. a checklist item.
    pub attribute_id: String,
    pub blob: FileBlob,
    /// Creation instant, used for ordering and retention.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_embeds_owner_and_time() {
        let at = Utc::now();
        let id = FileId::generate("J2", "A1", at);
        let prefix = format!("J2_A1_{}_", at.timestamp_millis());
        assert!(id.as_str().starts_with(&prefix));
        assert_eq!(id.as_str().len(), prefix.len() + SUFFIX_LEN);
    }

    #[test]
    fn same_instant_ids_differ() {
        let at = Utc::now();
        let ids: std::collections::HashSet<_> =
            (0..100).map(|_| FileId::generate("J", "A", at)).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn file_id_serializes_as_plain_string() {
        let id = FileId::from("J_A_1_abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"J_A_1_abc\"");
    }
}
