use config::{Config, ConfigError, Environment, File};

pub use common::config::OfflineAppConfig;

/// Load configuration: defaults, then the config file, then `OFFLINE__*` env vars.
///
/// The file path comes from `path`, else `OFFLINE_CONFIG`, else `config/offline`.
/// A missing file is not an error.
pub fn load(path: Option<&str>) -> Result<OfflineAppConfig, ConfigError> {
    let config_path = path
        .map(str::to_string)
        .or_else(|| std::env::var("OFFLINE_CONFIG").ok())
        .unwrap_or_else(|| "config/offline".to_string());

    let s = Config::builder()
        .set_default("storage.drafts_dir", "data/offline/drafts")?
        .set_default("storage.draft_quota_bytes", 5_242_880_i64)?
        .set_default("storage.files_path", "data/offline/files.db")?
        .set_default("storage.max_connections", 4_i64)?
        .set_default("retention.window_secs", 604_800_i64)?
        .set_default("autosave.interval_ms", 30_000_i64)?
        .add_source(File::with_name(&config_path).required(false))
        // Override from environment (e.g., OFFLINE__RETENTION__WINDOW_SECS)
        .add_source(Environment::with_prefix("OFFLINE").separator("__"))
        .build()?;

    s.try_deserialize()
}
