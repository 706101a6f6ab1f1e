//! Document and node store

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Document, Node};

/// Source documents and the nodes parsed from them, keyed by ID
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentStore {
    documents: BTreeMap<String, Document>,
    nodes: BTreeMap<String, Node>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_documents(&mut self, documents: impl IntoIterator<Item = Document>) {
        for doc in documents {
            self.documents.insert(doc.id.clone(), doc);
        }
    }

    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        for node in nodes {
            self.nodes.insert(node.id.clone(), node);
        }
    }

    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node whose document is not in the store
    pub fn orphan_node(&self) -> Option<&Node> {
        self.nodes
            .values()
            .find(|n| !self.documents.contains_key(&n.document_id))
    }
}
