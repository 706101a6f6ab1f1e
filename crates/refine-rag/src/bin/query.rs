//! Interactive query binary
//!
//! Run with: cargo run -p refine-rag --bin refine-rag-query
//!
//! Takes no arguments. The index directory comes from `query.index_dir`
//! (`./index` by default, `REFINE_RAG_INDEX_DIR` to override).

use anyhow::{Context, Result};
use std::io;

use refine_rag::{logging, repl, QueryEngine, RagConfig};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = RagConfig::load(None).context("Failed to load configuration")?;
    let index_dir = config.query.index_dir.clone();

    let engine = QueryEngine::open(&config, &index_dir)
        .with_context(|| format!("Failed to open index at {}", index_dir.display()))?;

    tracing::info!(
        "Loaded {} nodes; LLM {} ({}), top_k {}",
        engine.index().len(),
        engine.synthesizer().llm().name(),
        engine.synthesizer().llm().model(),
        config.retrieval.similarity_top_k
    );
    if !engine.synthesizer().llm().health_check().await.unwrap_or(false) {
        tracing::warn!(
            "{} not available at {}",
            engine.synthesizer().llm().name(),
            config.provider.base_url()
        );
    }

    let stdin = io::stdin();
    let summary = repl::run_repl(&engine, stdin.lock(), io::stdout()).await?;
    tracing::info!(
        "Session ended after {} queries ({} failed)",
        summary.queries,
        summary.failures
    );
    Ok(())
}
