use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::domain::{CodeChunk, DomainError, Embedding, EmbeddingConfig};

/// Default target: Ollama running locally on its standard port.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
/// Default model produces 384-dimensional vectors, matching the store schema.
const DEFAULT_MODEL: &str = "all-minilm";

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// HTTP client for OpenAI-compatible `/v1/embeddings` endpoints (Ollama,
/// LM Studio, or the OpenAI cloud).
///
/// **Local-first defaults**: targets Ollama on `http://localhost:11434`
/// without an API key. Override via environment variables:
///
/// ```text
/// CODEATLAS_EMBEDDING_BASE_URL=https://api.openai.com
/// CODEATLAS_EMBEDDING_API_KEY=sk-...
/// CODEATLAS_EMBEDDING_MODEL=text-embedding-3-small
/// ```
///
/// Before each batch the client sends a lightweight `HEAD /` probe with a
/// 2-second timeout. If the server isn't reachable the call fails
/// immediately instead of hanging for the full request timeout.
pub struct HttpEmbedding {
    client: reqwest::Client,
    /// Cheap connectivity check — short timeout, discards the response body.
    probe_client: reqwest::Client,
    api_key: String,
    config: EmbeddingConfig,
    /// Full endpoint URL (base + EMBEDDINGS_PATH).
    url: String,
    /// Base URL used for the probe.
    base_url: String,
}

impl HttpEmbedding {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base: String = base_url.into();
        let trimmed = base.trim_end_matches('/');
        let url = format!("{trimmed}{EMBEDDINGS_PATH}");
        let base_url = format!("{trimmed}/");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            probe_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            config: EmbeddingConfig::new(model.into()),
            url,
            base_url,
        }
    }

    /// Construct from environment variables with local-first defaults:
    ///
    /// | Variable                       | Default                  | Purpose                |
    /// |--------------------------------|--------------------------|------------------------|
    /// | `CODEATLAS_EMBEDDING_BASE_URL` | `http://localhost:11434` | Ollama / any server    |
    /// | `CODEATLAS_EMBEDDING_MODEL`    | `all-minilm`             | 384-dim model          |
    /// | `CODEATLAS_EMBEDDING_API_KEY`  | `""` (empty)             | Not required for local |
    pub fn from_env() -> Self {
        let base = std::env::var("CODEATLAS_EMBEDDING_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("CODEATLAS_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("CODEATLAS_EMBEDDING_API_KEY").unwrap_or_default();
        Self::new(key, model, base)
    }

    /// Fast connectivity probe. Any HTTP response — even 4xx/5xx — means the
    /// server is up; only connection-refused or probe timeout fail.
    async fn ensure_reachable(&self) -> Result<(), DomainError> {
        match self.probe_client.head(&self.base_url).send().await {
            Err(e) if e.is_connect() || e.is_timeout() => Err(DomainError::embedding(format!(
                "Embedding server not reachable at {}: {e}",
                self.base_url.trim_end_matches('/')
            ))),
            _ => Ok(()),
        }
    }

    async fn embed_texts(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_reachable().await?;

        let expected = texts.len();
        let request = ApiRequest {
            model: self.config.model_name(),
            input: texts,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Embedding API returned {status}: {body}");
            return Err(DomainError::embedding(format!(
                "Embedding API returned {status}"
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            DomainError::embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        if api_response.data.len() != expected {
            return Err(DomainError::embedding(format!(
                "Embedding API returned {} vectors for {} inputs",
                api_response.data.len(),
                expected
            )));
        }

        let vectors: Vec<Vec<f32>> = api_response
            .data
            .into_iter()
            .map(|row| row.embedding)
            .collect();

        for vector in &vectors {
            if vector.len() != self.config.dimensions() {
                return Err(DomainError::embedding(format!(
                    "Embedding API returned {}-dimensional vector, expected {}",
                    vector.len(),
                    self.config.dimensions()
                )));
            }
        }

        Ok(vectors)
    }

    fn prepare_text(chunk: &CodeChunk) -> String {
        let mut text = String::new();

        if let Some(name) = chunk.symbol_name() {
            text.push_str(&format!("{} ", name));
        }

        text.push_str(&format!("[{}] ", chunk.language()));
        text.push_str(chunk.content());

        text
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedding {
    async fn embed_chunk(&self, chunk: &CodeChunk) -> Result<Embedding, DomainError> {
        let text = Self::prepare_text(chunk);
        let mut vectors = self.embed_texts(vec![&text]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| DomainError::embedding("Embedding API returned no vector"))?;

        Ok(Embedding::new(
            chunk.id().to_string(),
            vector,
            self.config.model_name().to_string(),
        ))
    }

    async fn embed_chunks(&self, chunks: &[CodeChunk]) -> Result<Vec<Embedding>, DomainError> {
        let texts: Vec<String> = chunks.iter().map(Self::prepare_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embed_texts(refs).await?;

        debug!("Embedded batch of {} chunks", chunks.len());

        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Embedding::new(
                    chunk.id().to_string(),
                    vector,
                    self.config.model_name().to_string(),
                )
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        let mut vectors = self.embed_texts(vec![query]).await?;
        vectors
            .pop()
            .ok_or_else(|| DomainError::embedding("Embedding API returned no vector"))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}
