use std::path::Path;

use bytes::Bytes;
use clap::{Parser, Subcommand};

use crate::controller::{DownloadOutcome, FileManager};
use crate::error::{AppError, AppResult};
use crate::models::PendingUpload;

#[derive(Parser)]
#[command(
    name = "bucketdesk",
    about = "BucketDesk — drag-and-drop file manager for an object storage bucket",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory of the bucket
    #[arg(long, global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server and file manager page
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List stored files, newest upload first
    #[command(visible_alias = "ls")]
    List,

    /// Upload files one after another
    Put {
        /// Local files to upload; each is stored under its file name
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Download one file, or several as files.zip
    Get {
        /// Keys of the files to download
        #[arg(required = true)]
        keys: Vec<String>,
        /// Where to write the result (defaults to the key, or files.zip)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Delete files
    #[command(visible_alias = "rm")]
    Remove {
        /// Keys of the files to delete
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

pub async fn run_cli(manager: &FileManager, command: Commands) -> AppResult<()> {
    match command {
        Commands::Serve { .. } => unreachable!("Serve is handled in main"),

        Commands::List => {
            let files = manager.list_files().await?;
            if files.is_empty() {
                println!("No files stored. Upload one with: bucketdesk put <file>");
                return Ok(());
            }
            println!("{:<20} {:>12}  {}", "UPLOADED", "SIZE", "NAME");
            println!("{}", "─".repeat(70));
            for f in &files {
                println!("{:<20} {:>12}  {}", f.date_label, f.size_human, f.name);
            }
            println!("{}", "─".repeat(70));
            println!("{} file(s)", files.len());
        }

        Commands::Put { files } => {
            let mut staged = Vec::with_capacity(files.len());
            for source in &files {
                let data = tokio::fs::read(source).await.map_err(|e| {
                    AppError::InvalidRequest(format!("Cannot read file '{}': {}", source, e))
                })?;
                let name = Path::new(source)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| source.clone());
                staged.push(PendingUpload { name, data: Bytes::from(data), content_type: None });
            }
            manager.stage(staged);
            println!("{}", manager.staging_preview());

            let mut progress = manager.subscribe_progress();
            let printer = tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let current = progress.borrow_and_update().clone();
                    if let Some(p) = current {
                        println!("  ↑ {} {:>5.1}%", p.file_name, p.percent);
                    }
                }
            });

            let result = manager.upload_pending().await;
            printer.abort();
            for name in result? {
                println!("✓ Uploaded '{}'", name);
            }
        }

        Commands::Get { keys, output } => {
            select(manager, &keys).await?;
            match manager.download_selected().await? {
                DownloadOutcome::Direct { url, filename } => {
                    let data = manager.storage().download(&filename).await?;
                    let out_path = output.unwrap_or_else(|| filename.clone());
                    tokio::fs::write(&out_path, &data).await?;
                    println!("✓ Downloaded {} → '{}'", url, out_path);
                }
                DownloadOutcome::Archive { filename, bytes } => {
                    let out_path = output.unwrap_or(filename);
                    tokio::fs::write(&out_path, &bytes).await?;
                    println!("✓ Archived {} file(s) → '{}'", keys.len(), out_path);
                }
            }
        }

        Commands::Remove { keys } => {
            select(manager, &keys).await?;
            let outcome = manager.delete_selected().await?;
            for key in &outcome.deleted {
                println!("✓ Deleted {}", key);
            }
            for failure in &outcome.failed {
                eprintln!("✗ {}: {}", failure.key, failure.message);
            }
            println!("{} file(s) remaining", outcome.files.len());
        }
    }

    Ok(())
}

/// Check the given keys the way a user would tick rows in the listing
async fn select(manager: &FileManager, keys: &[String]) -> AppResult<()> {
    let files = manager.list_files().await?;
    for key in keys {
        if !files.iter().any(|f| &f.full_path == key) {
            return Err(AppError::ObjectNotFound(key.clone()));
        }
        manager.set_checked(key, true);
    }
    Ok(())
}
