//! Vector store index: persisted stores plus the searchable in-memory index

pub mod docstore;
pub mod index_store;
pub mod storage;
pub mod vector_store;

use std::path::Path;

use crate::error::Result;
use crate::types::{Document, IndexEntry, Node, NodeWithScore};

pub use docstore::DocumentStore;
pub use index_store::IndexStore;
pub use storage::StorageContext;
pub use vector_store::{cosine_similarity, SearchHit, VectorIndex, VectorStoreData};

/// A built (or loaded) index ready for retrieval
#[derive(Debug, Clone)]
pub struct VectorStoreIndex {
    storage: StorageContext,
    vectors: VectorIndex,
}

impl VectorStoreIndex {
    /// Assemble an index from parsed documents, their nodes and embeddings
    pub fn from_parts(
        documents: Vec<Document>,
        nodes: Vec<Node>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let mut vectors = VectorIndex::new();
        vectors.add(entries)?;

        let mut docstore = DocumentStore::new();
        docstore.add_documents(documents);
        docstore.add_nodes(nodes);

        let storage = StorageContext::new(
            docstore,
            IndexStore::new(vectors.node_ids()),
            vectors.to_data(),
        );
        Ok(Self { storage, vectors })
    }

    /// Load a persisted index
    pub fn load(dir: &Path) -> Result<Self> {
        let storage = StorageContext::load(dir)?;
        let vectors = VectorIndex::from_storage(&storage)?;
        Ok(Self { storage, vectors })
    }

    /// Persist to `dest`; see `StorageContext::persist`
    pub fn persist(&self, dest: &Path, overwrite: bool) -> Result<()> {
        self.storage.persist(dest, overwrite)
    }

    /// Top `k` nodes for a query embedding
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<NodeWithScore>> {
        let hits = self.vectors.search(query, k)?;
        Ok(hits
            .into_iter()
            .map(|hit| NodeWithScore {
                node_id: hit.entry.node_id.clone(),
                text: hit.entry.text.clone(),
                metadata: hit.entry.metadata.clone(),
                score: hit.score,
            })
            .collect())
    }

    pub fn storage_context(&self) -> &StorageContext {
        &self.storage
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vectors.dimension()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use tempfile::TempDir;

    fn build() -> VectorStoreIndex {
        let doc = Document::new("a.txt", "one two three four", Metadata::new());
        let first = Node::from_span(&doc, 0, (0, 2), (0, 8));
        let second = Node::from_span(&doc, 1, (2, 4), (8, doc.text.len()));
        let entries = vec![
            IndexEntry::new(&first, vec![1.0, 0.0]),
            IndexEntry::new(&second, vec![0.6, 0.8]),
        ];
        VectorStoreIndex::from_parts(vec![doc], vec![first, second], entries).unwrap()
    }

    #[test]
    fn test_search_returns_node_text() {
        let index = build();
        let results = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "three four");
    }

    #[test]
    fn test_loaded_index_searches_identically() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("index");
        let index = build();
        index.persist(&dest, false).unwrap();

        let loaded = VectorStoreIndex::load(&dest).unwrap();
        assert_eq!(loaded.len(), index.len());
        for query in [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5], [-1.0, 0.2]] {
            assert_eq!(
                loaded.search(&query, 2).unwrap(),
                index.search(&query, 2).unwrap()
            );
        }
    }
}
