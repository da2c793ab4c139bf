use async_trait::async_trait;

use crate::domain::models::{CodeChunk, Embedding, EmbeddingConfig};
use crate::domain::DomainError;

/// Port for producing vector embeddings of code chunks and queries.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single chunk.
    async fn embed_chunk(&self, chunk: &CodeChunk) -> Result<Embedding, DomainError>;

    /// Generates embeddings for a batch of chunks, preserving order.
    async fn embed_chunks(&self, chunks: &[CodeChunk]) -> Result<Vec<Embedding>, DomainError>;

    /// Generates an embedding for a free-text query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError>;

    /// The model configuration, including the identifier recorded on
    /// repositories indexed with it.
    fn config(&self) -> &EmbeddingConfig;
}
