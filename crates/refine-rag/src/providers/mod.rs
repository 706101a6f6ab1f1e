//! Remote provider abstractions for embeddings and completions
//!
//! The traits are the only network boundary of the pipeline. `Embedder`
//! and the response synthesizer wrap them with batching and retries.

pub mod embedder;
pub mod embedding;
mod http;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use crate::config::{BackendProvider, RagConfig};
use crate::error::Result;

pub use embedder::Embedder;
pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use openai::{OpenAiEmbedder, OpenAiLlm, OpenAiProvider};
pub use retry::RetryPolicy;

/// Embedding and completion providers for the configured backend
pub fn from_config(
    config: &RagConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    match config.provider.backend {
        BackendProvider::Ollama => {
            let (embedder, llm) = OllamaProvider::new(config)?.split();
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
        BackendProvider::OpenAi => {
            let (embedder, llm) = OpenAiProvider::new(config)?.split();
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
    }
}
