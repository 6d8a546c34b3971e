mod commands;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;

use commands::SweepTargets;

/// Inspect and maintain the offline draft and staged-file stores.
#[derive(Debug, Parser)]
#[command(name = "offlinectl", version, about)]
struct Cli {
    /// Config file (without extension is fine). Defaults to `config/offline`.
    #[arg(long, global = true, env = "OFFLINE_CONFIG")]
    config: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Locally persisted job-form drafts.
    #[command(subcommand)]
    Drafts(DraftsCommand),
    /// Locally staged file attachments.
    #[command(subcommand)]
    Files(FilesCommand),
    /// Evict entries older than the retention window.
    Sweep {
        /// Override the configured retention window.
        #[arg(long)]
        window_secs: Option<u64>,
        /// Only sweep drafts.
        #[arg(long, conflicts_with = "files_only")]
        drafts_only: bool,
        /// Only sweep staged files.
        #[arg(long)]
        files_only: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DraftsCommand {
    /// List job ids in the draft index with their last-write time.
    List,
    /// Print one draft record as JSON.
    Show { job_id: String },
    /// Delete one draft.
    Delete { job_id: String },
}

#[derive(Debug, Subcommand)]
enum FilesCommand {
    /// Stage a local file for a job attribute; prints the new file id.
    Stage {
        job_id: String,
        attribute_id: String,
        path: PathBuf,
        /// MIME type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },
    /// List files staged for a job attribute.
    List { job_id: String, attribute_id: String },
    /// Write a staged file's bytes to `--out`.
    Get {
        file_id: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete one staged file.
    Delete { file_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = config::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Command::Drafts(DraftsCommand::List) => commands::list_drafts(&config).await,
        Command::Drafts(DraftsCommand::Show { job_id }) => {
            commands::show_draft(&config, &job_id).await
        }
        Command::Drafts(DraftsCommand::Delete { job_id }) => {
            commands::delete_draft(&config, &job_id).await
        }
        Command::Files(FilesCommand::Stage {
            job_id,
            attribute_id,
            path,
            mime,
        }) => commands::stage_file(&config, &job_id, &attribute_id, &path, mime).await,
        Command::Files(FilesCommand::List {
            job_id,
            attribute_id,
        }) => commands::list_files(&config, &job_id, &attribute_id).await,
        Command::Files(FilesCommand::Get { file_id, out }) => {
            commands::get_file(&config, &file_id, &out).await
        }
        Command::Files(FilesCommand::Delete { file_id }) => {
            commands::delete_file(&config, &file_id).await
        }
        Command::Sweep {
            window_secs,
            drafts_only,
            files_only,
        } => {
            let targets = SweepTargets {
                drafts: !files_only,
                files: !drafts_only,
            };
            commands::sweep(&config, window_secs.map(Duration::from_secs), targets).await
        }
    }
}
