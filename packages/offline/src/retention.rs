use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::{KeyValueEngine, StorageError};
use tracing::{info, warn};

use crate::blob_store::BlobStore;
use crate::record_store::RecordStore;

/// Default retention window: 7 days.
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries looked at (index entries for drafts, stored rows for files).
    pub examined: usize,
    /// Entries deleted: aged out, or for drafts also missing/corrupt.
    pub removed: usize,
    /// Entries left in place.
    pub kept: usize,
}

/// Age-based eviction policy shared by both stores.
///
/// Sweeps are maintenance, not transactions: a write racing a sweep may or
/// may not be seen by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweeper {
    window: Duration,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_WINDOW)
    }
}

impl RetentionSweeper {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records written strictly before this instant are eligible for eviction.
    pub fn cutoff(&self) -> DateTime<Utc> {
        cutoff_for(self.window)
    }

    /// Evict aged-out drafts and rebuild the draft index.
    ///
    /// Index entries whose record is missing or unparseable are dropped too.
    /// The index is then replaced wholesale with the surviving keys. Entries
    /// whose record cannot be read or removed because of an engine error are
    /// kept.
    pub async fn sweep_drafts<E>(&self, store: &RecordStore<E>) -> Result<SweepReport, StorageError>
    where
        E: KeyValueEngine + ?Sized,
    {
        let cutoff = self.cutoff();
        let mut report = SweepReport::default();
        let mut survivors = Vec::new();
        let mut seen = HashSet::new();

        for job_id in store.list_known_keys().await? {
            if !seen.insert(job_id.clone()) {
                continue;
            }
            report.examined += 1;

            match store.get_record(&job_id).await {
                Ok(Some(record)) if !record.is_older_than(cutoff) => {
                    survivors.push(job_id);
                    report.kept += 1;
                }
                Ok(_) => match store.remove_record(&job_id).await {
                    Ok(_) => report.removed += 1,
                    Err(e) => {
                        warn!(job_id, error = %e, "Could not remove draft during sweep, keeping it");
                        survivors.push(job_id);
                        report.kept += 1;
                    }
                },
                Err(e) => {
                    warn!(job_id, error = %e, "Could not read draft during sweep, keeping it");
                    survivors.push(job_id);
                    report.kept += 1;
                }
            }
        }

        store.replace_index(&survivors).await?;

        info!(
            examined = report.examined,
            removed = report.removed,
            kept = report.kept,
            window_secs = self.window.as_secs(),
            "Swept drafts"
        );

        Ok(report)
    }

    /// Evict staged files older than the window.
    pub async fn sweep_files(&self, store: &BlobStore) -> Result<SweepReport, StorageError> {
        let removed = store.sweep_older_than(self.window).await?;
        let kept = store.count().await?;
        Ok(SweepReport {
            examined: removed + kept,
            removed,
            kept,
        })
    }
}

/// `now - window`, saturating at the earliest representable instant.
pub(crate) fn cutoff_for(window: Duration) -> DateTime<Utc> {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_seven_days() {
        assert_eq!(RetentionSweeper::default().window(), Duration::from_secs(604_800));
    }

    #[test]
    fn cutoff_trails_now_by_window() {
        let sweeper = RetentionSweeper::new(Duration::from_secs(3600));
        let expected = Utc::now() - TimeDelta::hours(1);
        let drift = (sweeper.cutoff() - expected).num_seconds().abs();
        assert!(drift <= 1);
    }

    #[test]
    fn huge_window_saturates() {
        let sweeper = RetentionSweeper::new(Duration::MAX);
        assert_eq!(sweeper.cutoff(), DateTime::<Utc>::MIN_UTC);
    }
}
