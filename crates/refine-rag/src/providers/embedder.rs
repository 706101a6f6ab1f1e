//! Batched, retried embedding on top of an `EmbeddingProvider`

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::{IndexEntry, Node};

use super::embedding::EmbeddingProvider;
use super::retry::RetryPolicy;

/// Splits texts into provider batches and retries transient failures
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn from_config(config: &RagConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(
            provider,
            config.embeddings.batch_size,
            RetryPolicy::from_config(&config.retry),
        )
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed texts in order, one vector per text
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self
                .retry
                .run("embedding batch", || self.provider.embed_batch(batch))
                .await?;

            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.provider.name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            embeddings.extend(vectors);
            tracing::debug!(
                "Embedded batch {} ({}/{} texts)",
                batch_no + 1,
                embeddings.len(),
                texts.len()
            );
        }

        check_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    /// Embed a query string
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("no embedding returned for query"))
    }

    /// Embed nodes and pair each with its vector
    pub async fn embed_nodes(&self, nodes: &[Node]) -> Result<Vec<IndexEntry>> {
        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        tracing::info!(
            "Embedding {} nodes with {} ({}, batch size {})",
            nodes.len(),
            self.provider.name(),
            self.provider.model(),
            self.batch_size
        );

        let embeddings = self.embed_texts(&texts).await?;
        Ok(nodes
            .iter()
            .zip(embeddings)
            .map(|(node, embedding)| IndexEntry::new(node, embedding))
            .collect())
    }
}

fn check_dimensions(embeddings: &[Vec<f32>]) -> Result<()> {
    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(Error::embedding("provider returned an empty vector"));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != first.len()) {
        return Err(Error::embedding(format!(
            "inconsistent embedding dimensions: {} vs {}",
            first.len(),
            bad.len()
        )));
    }
    Ok(())
}
