mod config;
mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{ServerSettings, Settings};
use pdf_rag_core::{ingest_path, AnswerGenerator, DocumentProcessor, IngestionOptions, VectorStore};
use server::state::AppState;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag-server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload, search and chat API over HTTP.
    Serve(ServerSettings),
    /// Ingest a PDF file, or every PDF under a folder, into the vector store.
    Ingest {
        /// File or folder to ingest. Folders are walked recursively.
        #[arg(long)]
        path: PathBuf,
    },
}

async fn build_store(settings: &Settings) -> anyhow::Result<VectorStore> {
    let embedder = settings.embedder()?;
    let index = settings.vector_index().await?;
    info!(
        embedder = embedder.name(),
        backend = index.backend(),
        collection = %settings.collection_name,
        "vector store ready"
    );
    Ok(VectorStore::new(embedder, index))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag-server boot"
    );

    let processor = DocumentProcessor::new(IngestionOptions::default())?;
    let store = build_store(&cli.settings).await?;

    match cli.command {
        Command::Serve(server_settings) => {
            let generator = AnswerGenerator::new(store.clone(), cli.settings.chat_models()?);
            let state = AppState::new(processor, store, generator);
            server::serve(state, &server_settings).await?;
        }
        Command::Ingest { path } => {
            let report = ingest_path(&processor, &store, &path).await?;

            if !report.skipped_files.is_empty() {
                warn!(
                    skipped = report.skipped_files.len(),
                    path = %path.display(),
                    "some files were skipped"
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            println!(
                "{} file(s) ingested, {} chunk(s) stored, {} skipped",
                report.files_ingested,
                report.chunks_created,
                report.skipped_files.len()
            );
        }
    }

    Ok(())
}
