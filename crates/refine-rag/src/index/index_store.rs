//! Index structure: which nodes the vector index holds, in insertion order

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStore {
    pub index_id: String,
    /// Node IDs in the order they were added to the vector index
    pub node_ids: Vec<String>,
}

impl IndexStore {
    pub fn new(node_ids: Vec<String>) -> Self {
        Self {
            index_id: Uuid::new_v4().to_string(),
            node_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}
