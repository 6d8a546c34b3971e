use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::storage::FilesystemKvEngine;
use offline::{BlobStore, FileBlob, FileId, RecordStore, RetentionSweeper};
use serde::Serialize;
use tracing::info;

use crate::config::OfflineAppConfig;

pub async fn open_drafts(config: &OfflineAppConfig) -> Result<RecordStore<FilesystemKvEngine>> {
    let engine = FilesystemKvEngine::new(
        config.storage.drafts_dir.clone(),
        config.storage.draft_quota_bytes,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to open draft store at {}",
            config.storage.drafts_dir.display()
        )
    })?;

    Ok(RecordStore::new(
        Arc::new(engine),
        RetentionSweeper::new(config.retention.window()),
    ))
}

pub async fn open_files(config: &OfflineAppConfig) -> Result<BlobStore> {
    let store = BlobStore::new(config.storage.files_path.clone())
        .with_max_connections(config.storage.max_connections);
    store.initialize().await.with_context(|| {
        format!(
            "Failed to open file store at {}",
            config.storage.files_path.display()
        )
    })?;
    Ok(store)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct DraftSummary {
    job_id: String,
    /// `None` when the index names a record that is missing or unreadable.
    timestamp: Option<String>,
}

pub async fn list_drafts(config: &OfflineAppConfig) -> Result<()> {
    let drafts = open_drafts(config).await?;
    let mut summaries = Vec::new();
    for job_id in drafts.list_known_keys().await? {
        let timestamp = drafts
            .get_record(&job_id)
            .await?
            .map(|record| record.timestamp.to_rfc3339());
        summaries.push(DraftSummary { job_id, timestamp });
    }
    print_json(&summaries)
}

pub async fn show_draft(config: &OfflineAppConfig, job_id: &str) -> Result<()> {
    let drafts = open_drafts(config).await?;
    let record = drafts
        .get_record(job_id)
        .await?
        .with_context(|| format!("No draft stored for job '{job_id}'"))?;
    print_json(&record)
}

pub async fn delete_draft(config: &OfflineAppConfig, job_id: &str) -> Result<()> {
    open_drafts(config).await?.delete(job_id).await?;
    info!(job_id, "Draft deleted");
    Ok(())
}

pub async fn stage_file(
    config: &OfflineAppConfig,
    job_id: &str,
    attribute_id: &str,
    path: &Path,
    mime_type: Option<String>,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime_type =
        mime_type.unwrap_or_else(|| mime_guess::from_path(path).first_or_octet_stream().to_string());

    let files = open_files(config).await?;
    let file_id = files
        .put(job_id, attribute_id, FileBlob::new(name, mime_type, bytes))
        .await?;
    println!("{file_id}");
    Ok(())
}

#[derive(Serialize)]
struct FileSummary {
    file_id: FileId,
    name: String,
    mime_type: String,
    size_bytes: u64,
    timestamp: String,
}

pub async fn list_files(config: &OfflineAppConfig, job_id: &str, attribute_id: &str) -> Result<()> {
    let files = open_files(config).await?;
    let summaries: Vec<FileSummary> = files
        .list_for_job_and_attribute(job_id, attribute_id)
        .await?
        .into_iter()
        .map(|record| FileSummary {
            size_bytes: record.blob.size_bytes(),
            file_id: record.file_id,
            name: record.blob.name,
            mime_type: record.blob.mime_type,
            timestamp: record.timestamp.to_rfc3339(),
        })
        .collect();
    print_json(&summaries)
}

pub async fn get_file(config: &OfflineAppConfig, file_id: &str, out: &Path) -> Result<()> {
    let files = open_files(config).await?;
    let blob = files.get(&FileId::from(file_id)).await?;
    tokio::fs::write(out, &blob.bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(file_id, bytes = blob.bytes.len(), out = %out.display(), "File written");
    Ok(())
}

pub async fn delete_file(config: &OfflineAppConfig, file_id: &str) -> Result<()> {
    open_files(config)
        .await?
        .delete(&FileId::from(file_id))
        .await?;
    info!(file_id, "File deleted");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepTargets {
    pub drafts: bool,
    pub files: bool,
}

pub async fn sweep(
    config: &OfflineAppConfig,
    window: Option<Duration>,
    targets: SweepTargets,
) -> Result<()> {
    let sweeper = RetentionSweeper::new(window.unwrap_or_else(|| config.retention.window()));

    if targets.drafts {
        let drafts = open_drafts(config).await?;
        let report = sweeper.sweep_drafts(&drafts).await?;
        println!(
            "drafts: examined {}, removed {}, kept {}",
            report.examined, report.removed, report.kept
        );
    }

    if targets.files {
        let files = open_files(config).await?;
        let report = sweeper.sweep_files(&files).await?;
        println!("files: removed {}", report.removed);
    }

    Ok(())
}
