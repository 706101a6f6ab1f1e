//! Error types for the RAG pipeline

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source document could not be loaded
    #[error("Failed to load '{}': {message}", .path.display())]
    Loader { path: PathBuf, message: String },

    /// Build destination already exists and overwrite was not requested
    #[error("Destination directory {} already exists. Use --force to overwrite.", .0.display())]
    DestinationExists(PathBuf),

    /// Persisted storage context is missing, unreadable or inconsistent
    #[error("Corrupt store at '{}': {message}", .path.display())]
    CorruptStore { path: PathBuf, message: String },

    /// Retryable network failure (connect, timeout, 5xx)
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Provider asked us to slow down (HTTP 429)
    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Prompt template is missing a placeholder or binding
    #[error("Template error: {0}")]
    Template(String),

    /// Answer synthesis gave up on a language-model call
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a loader error
    pub fn loader(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Loader {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt store error
    pub fn corrupt_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a vector store error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create a transient network error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork(message.into())
    }

    /// Whether a caller may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::RateLimit { .. })
    }

    /// Delay requested by the provider, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
