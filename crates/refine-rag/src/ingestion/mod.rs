//! Document ingestion: directory loading, PDF text extraction and node parsing

mod chunker;
mod loader;
mod pdf;

pub use chunker::NodeParser;
pub use loader::DirectoryLoader;
