//! Configuration for the RAG pipeline
//!
//! One `RagConfig` is built per process and handed to the constructors that
//! need it; nothing here is global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::synthesis::ResponseMode;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "refine-rag.toml";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "REFINE_RAG_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Remote provider selection and connection settings
    pub provider: ProviderConfig,
    /// Document loading
    pub loader: LoaderConfig,
    /// Node parsing
    pub chunking: ChunkingConfig,
    /// Embedding model and batching
    pub embeddings: EmbeddingConfig,
    /// Completion model and context budget
    pub llm: LlmConfig,
    /// Prompt template overrides
    pub prompt: PromptConfig,
    /// Retrieval depth and synthesis strategy
    pub retrieval: RetrievalConfig,
    /// Retry policy for remote calls
    pub retry: RetryConfig,
    /// Query-time settings
    pub query: QueryConfig,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible HTTP API
    OpenAi,
}

impl std::str::FromStr for BackendProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::config(format!("Unknown provider backend: {}", other))),
        }
    }
}

/// Provider connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which backend serves embeddings and completions
    pub backend: BackendProvider,
    /// Base URL (defaults per backend when unset)
    pub base_url: Option<String>,
    /// API key (OpenAI only; falls back to `OPENAI_API_KEY`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: BackendProvider::Ollama,
            base_url: None,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    /// Base URL with the backend default applied
    pub fn base_url(&self) -> String {
        let url = match (&self.base_url, self.backend) {
            (Some(url), _) => url.clone(),
            (None, BackendProvider::Ollama) => "http://localhost:11434".to_string(),
            (None, BackendProvider::OpenAi) => "https://api.openai.com/v1".to_string(),
        };
        url.trim_end_matches('/').to_string()
    }

    /// Embedding model served by this backend when none is configured
    pub fn default_embedding_model(&self) -> &'static str {
        match self.backend {
            BackendProvider::Ollama => "nomic-embed-text",
            BackendProvider::OpenAi => "text-embedding-ada-002",
        }
    }

    /// Completion model served by this backend when none is configured
    pub fn default_llm_model(&self) -> &'static str {
        match self.backend {
            BackendProvider::Ollama => "llama3.2:3b",
            BackendProvider::OpenAi => "gpt-3.5-turbo-1106",
        }
    }
}

/// Document loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Skip files and directories whose name starts with a dot
    pub exclude_hidden: bool,
    /// Only load these extensions (without dot); empty loads everything
    pub required_exts: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            exclude_hidden: true,
            required_exts: Vec::new(),
        }
    }
}

/// Node parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target node size in tokens
    pub chunk_size: usize,
    /// Overlap between adjacent nodes as a fraction of `chunk_size`
    pub chunk_overlap_ratio: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap_ratio: 0.05,
        }
    }
}

impl ChunkingConfig {
    /// Overlap in tokens
    pub fn overlap_tokens(&self) -> usize {
        (self.chunk_size as f64 * f64::from(self.chunk_overlap_ratio)).floor() as usize
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name (defaults per backend when unset)
    pub model: Option<String>,
    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            batch_size: 1,
        }
    }
}

/// Completion model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generation model name (defaults per backend when unset)
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Model context window (tokens)
    pub context_window: usize,
    /// Tokens reserved for the model's answer
    pub num_output: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            context_window: 4096,
            num_output: 256,
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// File holding the question-answer template
    pub qa_template_path: Option<PathBuf>,
    /// File holding the refine template
    pub refine_template_path: Option<PathBuf>,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nodes retrieved per query
    pub similarity_top_k: usize,
    /// Answer synthesis strategy
    pub response_mode: ResponseMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: 2,
            response_mode: ResponseMode::Compact,
        }
    }
}

/// Retry policy for remote calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

/// Query-time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Directory holding the persisted index
    pub index_dir: PathBuf,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./index"),
        }
    }
}

impl RagConfig {
    /// Embedding model with the backend default applied
    pub fn embedding_model(&self) -> String {
        self.embeddings
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_embedding_model().to_string())
    }

    /// Completion model with the backend default applied
    pub fn llm_model(&self) -> String {
        self.llm
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_llm_model().to_string())
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, `refine-rag.toml` in the
    /// working directory is used when present, defaults otherwise. Environment
    /// overrides are applied last, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("Invalid config: {}", e)))
    }

    /// Apply `REFINE_RAG_*` overrides and the OpenAI key fallback
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(backend) = var("BACKEND") {
            match backend.parse() {
                Ok(backend) => self.provider.backend = backend,
                Err(e) => tracing::warn!("Ignoring {}BACKEND: {}", ENV_PREFIX, e),
            }
        }
        if let Some(url) = var("BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if let Some(model) = var("EMBED_MODEL") {
            self.embeddings.model = Some(model);
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(dir) = var("INDEX_DIR") {
            self.query.index_dir = PathBuf::from(dir);
        }
        if self.provider.api_key.is_none() {
            self.provider.api_key = var("API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        let ratio = self.chunking.chunk_overlap_ratio;
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if !(0.0..1.0).contains(&ratio) {
            return Err(Error::config(format!(
                "chunking.chunk_overlap_ratio must be in [0, 1), got {}",
                ratio
            )));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than 0"));
        }
        if self.llm.num_output >= self.llm.context_window {
            return Err(Error::config(format!(
                "llm.num_output ({}) must be smaller than llm.context_window ({})",
                self.llm.num_output, self.llm.context_window
            )));
        }
        if self.retrieval.similarity_top_k == 0 {
            return Err(Error::config("retrieval.similarity_top_k must be greater than 0"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(Error::config("provider.timeout_secs must be greater than 0"));
        }
        Ok(())
    }
}
