//! Index build binary
//!
//! Run with: cargo run -p refine-rag --bin refine-rag-build -- -s ./docs -d ./index

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use refine_rag::{logging, providers, IndexBuilder, RagConfig};

#[derive(Parser)]
#[command(name = "refine-rag-build")]
#[command(about = "Build a persisted vector index from a directory of documents")]
#[command(version)]
struct Args {
    /// Source directory
    #[arg(short, long)]
    src: PathBuf,

    /// Destination directory
    #[arg(short, long)]
    dest: PathBuf,

    /// Replace the destination if it already exists
    #[arg(short, long)]
    force: bool,

    /// Path to config file (default: ./refine-rag.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let config = RagConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?} at {}", config.provider.backend, config.provider.base_url());
    tracing::info!("  - Embedding model: {}", config.embedding_model());
    tracing::info!(
        "  - Chunk size: {} (overlap ratio {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap_ratio
    );

    let (embedding, _llm) = providers::from_config(&config)?;
    match embedding.health_check().await {
        Ok(true) => tracing::info!("{} is reachable", embedding.name()),
        _ => tracing::warn!(
            "{} not available at {}; embedding calls will be retried and may fail",
            embedding.name(),
            config.provider.base_url()
        ),
    }

    let builder = IndexBuilder::from_config(&config, embedding)?;
    let summary = builder
        .build_and_persist(&args.src, &args.dest, args.force)
        .await?;

    println!(
        "Indexed {} documents into {} nodes at {} ({:.2?})",
        summary.documents,
        summary.nodes,
        summary.dest.display(),
        summary.elapsed
    );
    Ok(())
}
