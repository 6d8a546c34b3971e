use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key prefix of the draft namespace.
pub const DRAFT_KEY_PREFIX: &str = "draft:";

/// Well-known key of the record listing every job with a stored draft.
pub const DRAFT_INDEX_KEY: &str = "draft-index";

/// Storage key of the draft for `job_id`.
pub fn draft_key(job_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{job_id}")
}

/// A locally persisted snapshot of in-progress job-form state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    /// Job the draft belongs to. One draft per job.
    pub job_id: String,
    /// Opaque form state.
    pub data: serde_json::Value,
    /// Instant of the last successful write.
    pub timestamp: DateTime<Utc>,
}

impl DraftRecord {
    /// Build a record stamped with the current time.
    pub fn new(job_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            job_id: job_id.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// True when the record was written strictly before `cutoff`.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_draft_namespace() {
        assert_eq!(draft_key("J1"), "draft:J1");
        assert!(!DRAFT_INDEX_KEY.starts_with(DRAFT_KEY_PREFIX));
    }

    #[test]
    fn serializes_camel_case() {
        let record = DraftRecord::new("J1", serde_json::json!({"notes": "a"}));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["jobId"], "J1");
        assert_eq!(json["data"]["notes"], "a");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn age_comparison_is_strict() {
        let record = DraftRecord::new("J1", serde_json::Value::Null);
        assert!(!record.is_older_than(record.timestamp));
        assert!(record.is_older_than(record.timestamp + chrono::Duration::milliseconds(1)));
    }
}
