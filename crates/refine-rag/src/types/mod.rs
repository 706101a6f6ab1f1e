//! Core data types

pub mod document;
pub mod node;
pub mod response;

pub use document::{Document, Metadata};
pub use node::{IndexEntry, Node, NodeWithScore};
pub use response::{QueryBundle, QueryResponse};
