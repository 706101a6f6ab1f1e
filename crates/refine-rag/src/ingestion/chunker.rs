//! Token-window node parser with ratio-controlled overlap

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::tokens::token_starts;
use crate::types::{Document, Node};

/// Splits documents into overlapping token windows
#[derive(Debug, Clone)]
pub struct NodeParser {
    /// Window size in tokens
    chunk_size: usize,
    /// Tokens shared by adjacent windows
    overlap: usize,
}

impl NodeParser {
    /// Create a parser from chunking settings
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if !(0.0..1.0).contains(&config.chunk_overlap_ratio) {
            return Err(Error::config(format!(
                "chunk_overlap_ratio must be in [0, 1), got {}",
                config.chunk_overlap_ratio
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap_tokens().min(config.chunk_size - 1),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one document into nodes
    ///
    /// A window holds at most `chunk_size` tokens and ends on the last
    /// sentence boundary that fits, or mid-sentence when none does. The next
    /// window starts `overlap` tokens before the previous end. The first node
    /// starts at byte 0 and the last ends at the end of the text, so the
    /// nodes cover the whole document.
    pub fn get_nodes(&self, document: &Document) -> Vec<Node> {
        let text = &document.text;
        let starts = token_starts(text);
        let total = starts.len();

        if total <= self.chunk_size {
            return vec![Node::from_span(document, 0, (0, total), (0, text.len()))];
        }

        let boundaries = sentence_boundaries(text, &starts);
        let mut nodes = Vec::with_capacity(total / (self.chunk_size - self.overlap) + 1);
        let mut token_start = 0usize;

        loop {
            let token_end = self.window_end(token_start, total, &boundaries);
            let char_start = if token_start == 0 { 0 } else { starts[token_start] };
            let char_end = if token_end == total {
                text.len()
            } else {
                starts[token_end]
            };

            nodes.push(Node::from_span(
                document,
                nodes.len(),
                (token_start, token_end),
                (char_start, char_end),
            ));

            if token_end == total {
                break;
            }
            token_start = token_end - self.overlap;
        }

        nodes
    }

    /// End of the window starting at `token_start`
    ///
    /// Must stay past `token_start + overlap` so the next window moves forward.
    fn window_end(&self, token_start: usize, total: usize, boundaries: &[usize]) -> usize {
        let hard_end = (token_start + self.chunk_size).min(total);
        if hard_end == total {
            return total;
        }
        let fitting = boundaries.partition_point(|&b| b <= hard_end);
        match fitting.checked_sub(1).map(|i| boundaries[i]) {
            Some(b) if b > token_start + self.overlap => b,
            _ => hard_end,
        }
    }

    /// Split many documents, preserving document order
    pub fn get_nodes_from_documents(&self, documents: &[Document]) -> Vec<Node> {
        let nodes: Vec<Node> = documents.iter().flat_map(|d| self.get_nodes(d)).collect();
        tracing::info!(
            "Parsed {} documents into {} nodes (chunk_size={}, overlap={})",
            documents.len(),
            nodes.len(),
            self.chunk_size,
            self.overlap
        );
        nodes
    }
}

/// Token indices at which a sentence starts, excluding the first
fn sentence_boundaries(text: &str, starts: &[usize]) -> Vec<usize> {
    let mut boundaries: Vec<usize> = text
        .split_sentence_bound_indices()
        .filter(|(offset, _)| *offset > 0)
        .map(|(offset, _)| starts.partition_point(|&s| s < offset))
        .filter(|&token| token > 0 && token < starts.len())
        .collect();
    boundaries.dedup();
    boundaries
}
