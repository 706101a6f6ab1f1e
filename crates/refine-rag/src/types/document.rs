//! Source documents as read by the loader

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Free-form metadata attached to documents and inherited by their nodes
pub type Metadata = HashMap<String, serde_json::Value>;

/// A document read from the source directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable document ID (path relative to the source root)
    pub id: String,
    /// Full text
    pub text: String,
    /// Content hash for change detection
    pub content_hash: String,
    /// File metadata (path, name, type, size, dates)
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a new document
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            content_hash: Self::hash_text(&text),
            text,
            metadata,
        }
    }

    /// Hex sha256 of the text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Original file path, when the loader recorded one
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").and_then(|v| v.as_str())
    }
}
