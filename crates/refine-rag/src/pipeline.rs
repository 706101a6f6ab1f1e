//! Build pipeline: load, parse, embed, index, persist

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::index::VectorStoreIndex;
use crate::ingestion::{DirectoryLoader, NodeParser};
use crate::providers::{Embedder, EmbeddingProvider};

/// What a build produced
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub documents: usize,
    pub nodes: usize,
    pub dimension: Option<usize>,
    pub dest: PathBuf,
    pub elapsed: Duration,
}

/// Turns a directory of documents into a persisted vector index
pub struct IndexBuilder {
    loader: DirectoryLoader,
    parser: NodeParser,
    embedder: Embedder,
}

impl IndexBuilder {
    pub fn new(loader: DirectoryLoader, parser: NodeParser, embedder: Embedder) -> Self {
        Self {
            loader,
            parser,
            embedder,
        }
    }

    pub fn from_config(config: &RagConfig, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Ok(Self::new(
            DirectoryLoader::new(config.loader.clone()),
            NodeParser::new(&config.chunking)?,
            Embedder::from_config(config, embedding),
        ))
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Build an in-memory index from `src`
    pub async fn build(&self, src: &Path) -> Result<VectorStoreIndex> {
        let documents = self.loader.load_data(src)?;
        tracing::info!("Loaded {} documents from {}", documents.len(), src.display());

        let nodes = self.parser.get_nodes_from_documents(&documents);
        let entries = self.embedder.embed_nodes(&nodes).await?;
        tracing::info!("Embedded {} nodes", entries.len());

        VectorStoreIndex::from_parts(documents, nodes, entries)
    }

    /// Build from `src` and persist to `dest`
    ///
    /// An existing `dest` is rejected before any document is read or
    /// embedded unless `overwrite` is set.
    pub async fn build_and_persist(
        &self,
        src: &Path,
        dest: &Path,
        overwrite: bool,
    ) -> Result<BuildSummary> {
        if dest.exists() && !overwrite {
            return Err(Error::DestinationExists(dest.to_path_buf()));
        }

        let started = Instant::now();
        let index = self.build(src).await?;
        index.persist(dest, overwrite)?;

        let summary = BuildSummary {
            documents: index.storage_context().docstore.document_count(),
            nodes: index.len(),
            dimension: index.dimension(),
            dest: dest.to_path_buf(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Index built: {} documents, {} nodes in {:.2?}",
            summary.documents,
            summary.nodes,
            summary.elapsed
        );
        Ok(summary)
    }
}
