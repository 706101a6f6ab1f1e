//! Nodes (chunks) and their index entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Document, Metadata};

/// A contiguous span of one document, embedded and retrieved on its own
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Unique node ID
    pub id: String,
    /// Owning document ID
    pub document_id: String,
    /// Text content (exactly `document.text[char_start..char_end]`)
    pub text: String,
    /// Byte offsets in the document text
    pub char_start: usize,
    pub char_end: usize,
    /// Token range in the document
    pub token_start: usize,
    pub token_end: usize,
    /// Position within the document
    pub index: usize,
    /// Metadata inherited from the document
    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    /// Create a node covering `document.text[char_start..char_end]`
    ///
    /// The ID is derived from the document, position and content, so
    /// parsing the same document twice yields the same IDs.
    pub fn from_span(
        document: &Document,
        index: usize,
        (token_start, token_end): (usize, usize),
        (char_start, char_end): (usize, usize),
    ) -> Self {
        let seed = format!(
            "{}:{}:{}:{}",
            document.id, document.content_hash, index, char_start
        );

        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string(),
            document_id: document.id.clone(),
            text: document.text[char_start..char_end].to_string(),
            char_start,
            char_end,
            token_start,
            token_end,
            index,
            metadata: document.metadata.clone(),
        }
    }
}

/// What the vector index stores per node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub node_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl IndexEntry {
    /// Pair a node with its embedding
    pub fn new(node: &Node, embedding: Vec<f32>) -> Self {
        Self {
            node_id: node.id.clone(),
            embedding,
            text: node.text.clone(),
            metadata: node.metadata.clone(),
        }
    }
}

/// A retrieved node with its similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeWithScore {
    pub node_id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity (higher is better)
    pub score: f32,
}

impl NodeWithScore {
    /// Short description of where the node came from
    pub fn source_label(&self) -> String {
        self.metadata
            .get("file_name")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.node_id)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_stable_and_distinct() {
        let doc = Document::new("notes/a.txt", "alpha beta gamma", Metadata::new());
        let first = Node::from_span(&doc, 0, (0, 2), (0, 11));
        let again = Node::from_span(&doc, 0, (0, 2), (0, 11));
        let second = Node::from_span(&doc, 1, (2, 3), (11, doc.text.len()));

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, second.id);
        assert_eq!(first.text, "alpha beta ");
        assert_eq!(second.text, "gamma");

        let edited = Document::new("notes/a.txt", "alpha beta delta", Metadata::new());
        assert_ne!(Node::from_span(&edited, 0, (0, 2), (0, 11)).id, first.id);
    }

    #[test]
    fn test_source_label_prefers_file_name() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), serde_json::json!("a.txt"));
        let hit = NodeWithScore {
            node_id: "n1".to_string(),
            text: String::new(),
            metadata,
            score: 0.5,
        };
        assert_eq!(hit.source_label(), "a.txt");

        let bare = NodeWithScore {
            metadata: Metadata::new(),
            ..hit
        };
        assert_eq!(bare.source_label(), "n1");
    }
}
