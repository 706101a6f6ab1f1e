//! refine-rag: document Q&A over a persisted vector index
//!
//! A build run loads a directory of documents, splits them into overlapping
//! nodes, embeds the nodes through a remote provider and persists the
//! storage context. A query run loads that storage context, retrieves the
//! nodes closest to a question and synthesizes an answer with the
//! compact-refine protocol against a remote language model.

pub mod config;
pub mod error;
pub mod index;
pub mod ingestion;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod repl;
pub mod synthesis;
pub mod tokens;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use index::VectorStoreIndex;
pub use pipeline::{BuildSummary, IndexBuilder};
pub use query::QueryEngine;
pub use types::{Document, IndexEntry, Node, NodeWithScore, QueryResponse};
