use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Local storage locations and limits.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding draft records. Default: "data/offline/drafts".
    #[serde(default = "default_drafts_dir")]
    pub drafts_dir: PathBuf,
    /// Byte quota for draft records; 0 disables it. Default: 5 MiB.
    #[serde(default = "default_draft_quota_bytes")]
    pub draft_quota_bytes: u64,
    /// SQLite database file for staged attachments. Default: "data/offline/files.db".
    #[serde(default = "default_files_path")]
    pub files_path: PathBuf,
    /// Connection pool size for the attachment database. Default: 4.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_drafts_dir() -> PathBuf {
    PathBuf::from("data/offline/drafts")
}
fn default_draft_quota_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_files_path() -> PathBuf {
    PathBuf::from("data/offline/files.db")
}
fn default_max_connections() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            drafts_dir: default_drafts_dir(),
            draft_quota_bytes: default_draft_quota_bytes(),
            files_path: default_files_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Age-based eviction settings.
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Records older than this are evicted by sweeps. Default: 7 days.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl RetentionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
        }
    }
}

/// Periodic draft persistence settings.
#[derive(Debug, Deserialize, Clone)]
pub struct AutoSaveConfig {
    /// Tick interval. Default: 30000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    30_000
}

impl AutoSaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Offline subsystem configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OfflineAppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub autosave: AutoSaveConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = OfflineAppConfig::default();
        assert_eq!(config.retention.window(), Duration::from_secs(604_800));
        assert_eq!(config.autosave.interval(), Duration::from_secs(30));
        assert_eq!(config.storage.draft_quota_bytes, 5_242_880);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: OfflineAppConfig =
            serde_json::from_str(r#"{"retention": {"window_secs": 60}}"#).unwrap();
        assert_eq!(config.retention.window_secs, 60);
        assert_eq!(config.autosave.interval_ms, 30_000);
        assert_eq!(config.storage.max_connections, 4);
    }
}
