///
/// This module implements the CLI interface for carbon-upload: command parsing,
/// argument overrides, and the user-visible output of each command.
///
/// All pipeline logic (validation, presign, transfer, confirm, URL caching) lives in
/// the [`carbon-upload-core`] crate. This module is CLI glue only.
///
/// ## How To Use
/// - For command-line users: run the `carbon-upload` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`carbon-upload-core`]: ../../carbon-upload-core/
use crate::client::HttpFileApi;
use crate::load_config::load_config;
use crate::local_file::load_files;
use anyhow::Result;
use carbon_upload_core::pipeline::upload_all;
use carbon_upload_core::url_cache::ReadUrls;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for carbon-upload: send evidence files to the carbon rewards platform.
#[derive(Parser)]
#[clap(
    name = "carbon-upload",
    version,
    about = "Upload evidence files to the carbon rewards platform via presigned storage URLs"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload files one after another: presign, transfer, confirm
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Override upload.directory from the config
        #[clap(long)]
        directory: Option<String>,
        /// Override upload.entity_type from the config
        #[clap(long)]
        entity_type: Option<String>,
        /// Override upload.entity_id from the config
        #[clap(long)]
        entity_id: Option<i64>,
        /// Files to upload, in order
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a temporary read URL for a stored object
    Url {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Object key (the file_path returned at upload time)
        object_key: String,
        /// Requested lifetime in seconds
        #[clap(long)]
        expires_in: Option<u64>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload {
            config,
            directory,
            entity_type,
            entity_id,
            files,
        } => {
            let mut config = load_config(config)?;
            if let Some(directory) = directory {
                config.upload.directory = directory;
            }
            if entity_type.is_some() {
                config.upload.entity_type = entity_type;
            }
            if entity_id.is_some() {
                config.upload.entity_id = entity_id;
            }

            let api = HttpFileApi::new(&config.api)?;
            let files = load_files(&files).await?;
            tracing::info!(command = "upload", count = files.len(), "Starting upload");
            println!("Upload starting...");

            let outcome = upload_all(&api, &files, &config.upload, |progress, result| {
                println!(
                    "[{}/{}] {} -> {}{}",
                    progress.completed_count,
                    progress.total_count,
                    result.original_name,
                    result.url,
                    if result.is_duplicate { " (duplicate)" } else { "" }
                );
            })
            .await;

            match outcome {
                Ok(results) => {
                    tracing::info!(command = "upload", uploaded = results.len(), "Upload complete");
                    println!("Upload complete.\nReport:");
                    println!("{}", serde_json::to_string_pretty(&results)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "upload", error = %e, "Upload failed");
                    eprintln!("[ERROR] Upload failed: {}", e);
                    if let Some(request_id) = e.source.request_id() {
                        eprintln!("Support reference: {request_id}");
                    }
                    if !e.completed.is_empty() {
                        eprintln!("Already uploaded:");
                        for result in &e.completed {
                            eprintln!("  {} -> {}", result.original_name, result.url);
                        }
                    }
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Url {
            config,
            object_key,
            expires_in,
        } => {
            let config = load_config(config)?;
            let api = HttpFileApi::new(&config.api)?;
            let urls = ReadUrls::new(api, config.upload.read_url_expires_in);
            match urls.temporary_url(&object_key, expires_in).await {
                Ok(url) => {
                    println!("{url}");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "url", error = %e, "Fetching temporary URL failed");
                    eprintln!("[ERROR] Could not get a URL for {object_key}: {e}");
                    if let Some(request_id) = e.request_id() {
                        eprintln!("Support reference: {request_id}");
                    }
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
