//! Query engine: retrieve then synthesize

use std::path::Path;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::index::VectorStoreIndex;
use crate::providers::{Embedder, EmbeddingProvider, LlmProvider};
use crate::synthesis::ResponseSynthesizer;
use crate::types::{NodeWithScore, QueryBundle, QueryResponse};

/// Answers questions against a loaded index
///
/// The index is shared read-only; one engine can serve queries one after
/// another without reloading.
pub struct QueryEngine {
    index: Arc<VectorStoreIndex>,
    embedder: Embedder,
    synthesizer: ResponseSynthesizer,
    similarity_top_k: usize,
}

impl QueryEngine {
    pub fn new(
        index: Arc<VectorStoreIndex>,
        embedder: Embedder,
        synthesizer: ResponseSynthesizer,
        similarity_top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            synthesizer,
            similarity_top_k,
        }
    }

    /// Wire an engine from config and explicit providers
    pub fn from_config(
        config: &RagConfig,
        index: Arc<VectorStoreIndex>,
        embedding: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        Ok(Self::new(
            index,
            Embedder::from_config(config, embedding),
            ResponseSynthesizer::from_config(config, llm)?,
            config.retrieval.similarity_top_k,
        ))
    }

    /// Load the index at `dir` and wire the configured providers
    pub fn open(config: &RagConfig, dir: &Path) -> Result<Self> {
        let index = Arc::new(VectorStoreIndex::load(dir)?);
        let (embedding, llm) = crate::providers::from_config(config)?;
        Self::from_config(config, index, embedding, llm)
    }

    pub fn index(&self) -> &Arc<VectorStoreIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn synthesizer(&self) -> &ResponseSynthesizer {
        &self.synthesizer
    }

    /// Embed the query and fetch the closest nodes
    pub async fn retrieve(&self, query: &str) -> Result<(QueryBundle, Vec<NodeWithScore>)> {
        let embedding = self.embedder.embed_query(query).await?;
        let nodes = self.index.search(&embedding, self.similarity_top_k)?;

        tracing::debug!(
            "Retrieved {} nodes (top_k={}): {:?}",
            nodes.len(),
            self.similarity_top_k,
            nodes
                .iter()
                .map(|n| format!("{} ({:.3})", n.source_label(), n.score))
                .collect::<Vec<_>>()
        );

        let bundle = QueryBundle {
            query_str: query.to_string(),
            embedding,
        };
        Ok((bundle, nodes))
    }

    /// Answer a question
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        let (bundle, nodes) = self.retrieve(query).await?;
        let response = self.synthesizer.synthesize(&bundle.query_str, nodes).await?;

        tracing::info!(
            "Answered query with {} LLM call(s) over {} source node(s)",
            response.llm_calls,
            response.source_nodes.len()
        );
        Ok(response)
    }
}
