//! In-memory vector index with exact cosine search

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::types::IndexEntry;

use super::storage::StorageContext;

/// Persisted form of the vector index: one embedding per node ID
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreData {
    pub dimension: usize,
    pub embeddings: BTreeMap<String, Vec<f32>>,
}

/// A search result borrowing its entry from the index
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub entry: &'a IndexEntry,
    pub score: f32,
}

/// Brute-force cosine index; entries are append-only
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    ids: HashSet<String>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries in bulk
    ///
    /// The batch is checked as a whole first, so a rejected batch leaves
    /// the index unchanged.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dimension = self.dimension;
        let mut batch_ids = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if entry.embedding.is_empty() {
                return Err(Error::vector_store(format!(
                    "node {} has an empty embedding",
                    entry.node_id
                )));
            }
            match dimension {
                Some(d) if d != entry.embedding.len() => {
                    return Err(Error::vector_store(format!(
                        "dimension mismatch for node {}: expected {}, got {}",
                        entry.node_id,
                        d,
                        entry.embedding.len()
                    )));
                }
                Some(_) => {}
                None => dimension = Some(entry.embedding.len()),
            }
            if self.ids.contains(&entry.node_id) || !batch_ids.insert(entry.node_id.as_str()) {
                return Err(Error::vector_store(format!(
                    "duplicate node id {}",
                    entry.node_id
                )));
            }
        }

        self.dimension = dimension;
        self.ids.extend(entries.iter().map(|e| e.node_id.clone()));
        self.entries.extend(entries);
        Ok(())
    }

    /// Top `k` entries by cosine similarity
    ///
    /// Results are ordered by non-increasing score; equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>> {
        if let Some(d) = self.dimension {
            if d != query.len() {
                return Err(Error::vector_store(format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    d
                )));
            }
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                entry,
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        // sort_by is stable, which keeps ties in insertion order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Rebuild the index in persisted insertion order
    pub fn from_storage(storage: &StorageContext) -> Result<Self> {
        let mut entries = Vec::with_capacity(storage.index_store.len());
        for node_id in &storage.index_store.node_ids {
            let node = storage.docstore.get_node(node_id).ok_or_else(|| {
                Error::vector_store(format!("node {} missing from document store", node_id))
            })?;
            let embedding = storage.vector_store.embeddings.get(node_id).ok_or_else(|| {
                Error::vector_store(format!("node {} has no stored embedding", node_id))
            })?;
            entries.push(IndexEntry::new(node, embedding.clone()));
        }

        let mut index = Self::new();
        index.add(entries)?;
        Ok(index)
    }

    /// Persisted form of this index
    pub fn to_data(&self) -> VectorStoreData {
        VectorStoreData {
            dimension: self.dimension.unwrap_or(0),
            embeddings: self
                .entries
                .iter()
                .map(|e| (e.node_id.clone(), e.embedding.clone()))
                .collect(),
        }
    }

    /// Node IDs in insertion order
    pub fn node_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.node_id.clone()).collect()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity; zero-norm or non-finite input scores 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a * norm_b);
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
