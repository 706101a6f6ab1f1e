//! OpenAI-compatible providers (`/embeddings`, `/chat/completions`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::http::{check_status, json_body, send_error, CallKind};
use super::llm::LlmProvider;

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    embed_model: String,
    chat_model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client; an API key is required
    pub fn new(config: &RagConfig) -> Result<Self> {
        let api_key = config
            .provider
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::config("OpenAI backend requires provider.api_key or OPENAI_API_KEY")
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.provider.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.provider.base_url(),
            api_key,
            embed_model: config.embedding_model(),
            chat_model: config.llm_model(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.num_output,
        })
    }

    /// Check that the models endpoint answers with our key
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(CallKind::Embedding, e))?;
        let response = check_status(CallKind::Embedding, response).await?;
        let body: EmbeddingResponse = json_body(CallKind::Embedding, response).await?;

        Ok(order_embeddings(body.data))
    }

    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.chat_model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(CallKind::Completion, e))?;
        let response = check_status(CallKind::Completion, response).await?;
        let body: ChatResponse = json_body(CallKind::Completion, response).await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm("chat completion returned no content"))
    }
}

/// Restore input order; the API tags each vector with its input index
fn order_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat completion provider
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    model: String,
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.client.chat(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Combined OpenAI provider sharing one client
pub struct OpenAiProvider {
    embedder: OpenAiEmbedder,
    llm: OpenAiLlm,
}

impl OpenAiProvider {
    pub fn new(config: &RagConfig) -> Result<Self> {
        let client = Arc::new(OpenAiClient::new(config)?);
        Ok(Self {
            embedder: OpenAiEmbedder {
                client: Arc::clone(&client),
                model: config.embedding_model(),
            },
            llm: OpenAiLlm {
                client,
                model: config.llm_model(),
            },
        })
    }

    /// Split into separate providers
    pub fn split(self) -> (OpenAiEmbedder, OpenAiLlm) {
        (self.embedder, self.llm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendProvider;

    fn openai_config(key: Option<&str>) -> RagConfig {
        let mut config = RagConfig::default();
        config.provider.backend = BackendProvider::OpenAi;
        config.provider.api_key = key.map(String::from);
        config
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        assert!(matches!(
            OpenAiProvider::new(&openai_config(None)),
            Err(Error::Config(_))
        ));
        assert!(OpenAiProvider::new(&openai_config(Some("  "))).is_err());
    }

    #[test]
    fn test_default_base_url_and_models() {
        let (embedder, llm) = OpenAiProvider::new(&openai_config(Some("sk-test")))
            .unwrap()
            .split();
        assert_eq!(embedder.client.base_url, "https://api.openai.com/v1");
        assert_eq!(embedder.model(), "text-embedding-ada-002");
        assert_eq!(llm.model(), "gpt-3.5-turbo-1106");
        assert_eq!(embedder.client.embed_model, "text-embedding-ada-002");
        assert_eq!(llm.client.chat_model, "gpt-3.5-turbo-1106");
    }

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#,
        )
        .unwrap();
        assert_eq!(order_embeddings(body.data), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_chat_response_parsing() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Paris"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("Paris"));
    }
}
