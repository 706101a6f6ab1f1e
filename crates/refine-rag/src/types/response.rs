//! Query-time types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::NodeWithScore;

/// A query and its embedding; lives for one query-response cycle
#[derive(Debug, Clone)]
pub struct QueryBundle {
    pub query_str: String,
    pub embedding: Vec<f32>,
}

/// Final answer with the nodes it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Synthesized answer
    pub response: String,
    /// Retrieved nodes, most similar first
    pub source_nodes: Vec<NodeWithScore>,
    /// Number of language-model calls made (1 answer + refines)
    pub llm_calls: usize,
}

impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.response)
    }
}
