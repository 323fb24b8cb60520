//! trove - catalog 3D-printable model files into a searchable library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;
use trove_catalog::{Database, Repository};
use trove_config::Config;
use trove_ingest::{UploadPayload, ingest_upload};
use trove_jobs::{RedisQueue, RedisQueueConfig, Worker, submit_scan};

#[derive(Parser)]
#[command(name = "trove", version, about = "Catalog 3D-printable model files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background worker pool, consuming scan jobs until interrupted.
    Worker,
    /// Queue a background scan of a library's root directory.
    Scan {
        /// Id of the library to scan.
        library_id: i64,
    },
    /// Ingest files (zip archives are expanded) into a model of a library.
    Upload {
        /// Id of the destination library.
        library_id: i64,
        /// Model the files belong to; its directory is created under
        /// the library root if needed.
        model_name: String,
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Manage libraries.
    Library {
        #[command(subcommand)]
        command: LibraryCommand,
    },
}

#[derive(Subcommand)]
enum LibraryCommand {
    /// Register a directory as a new library root.
    Add { name: String, path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(command: Command, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = config.database.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::connect(&config.database.path).await?;
    let repo = Repository::from(&db);

    match command {
        Command::Worker => {
            let queue = RedisQueue::new(RedisQueueConfig::with_url(&config.queue.url)).await?;
            let worker =
                Worker::new(Arc::new(queue), repo).with_concurrency(config.queue.concurrency);
            let shutdown = worker.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested; draining consumers");
                    shutdown.store(true, Ordering::SeqCst);
                }
            });
            tracing::info!(concurrency = config.queue.concurrency, "worker pool starting");
            worker.run().await;
        },
        Command::Scan { library_id } => {
            let library = repo.require_library(library_id).await?;
            let queue = RedisQueue::new(RedisQueueConfig::with_url(&config.queue.url)).await?;
            let job_id = submit_scan(&queue, &library).await?;
            println!("queued scan {job_id} for library {} ({})", library.id, library.name);
        },
        Command::Upload { library_id, model_name, files } => {
            let mut payloads = Vec::with_capacity(files.len());
            for file in files {
                let filename = file
                    .file_name()
                    .ok_or_else(|| format!("not a file path: {}", file.display()))?
                    .to_string_lossy()
                    .into_owned();
                let data = tokio::fs::read(&file).await?;
                payloads.push(UploadPayload::new(filename, data));
            }
            let outcome = ingest_upload(&repo, library_id, &model_name, payloads).await?;
            println!("ingested {} file(s) into {model_name}:", outcome.count);
            for name in &outcome.ingested {
                println!("  {name}");
            }
        },
        Command::Library { command } => match command {
            LibraryCommand::Add { name, path } => {
                let path = std::path::absolute(&path)?;
                let library = repo.create_library(&name, &path, "local").await?;
                println!("library {} ({}) -> {}", library.id, library.name, library.path.display());
            },
        },
    }

    db.close().await;
    Ok(())
}
