use async_trait::async_trait;

use crate::domain::models::{CodeChunk, Embedding, SearchQuery, SearchResult};
use crate::domain::DomainError;

/// Port for chunk and embedding storage with similarity search.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Atomically replaces a repository's chunks and embeddings. Old vectors
    /// are removed before the new ones become visible; a failure leaves no
    /// partial mix of runs.
    async fn replace_repository(
        &self,
        repository_id: &str,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError>;

    /// Finds the chunks nearest to `query_vector`, best first, honoring the
    /// query's limit and filters.
    async fn search(
        &self,
        query_vector: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;

    async fn count_by_repository(&self, repository_id: &str) -> Result<usize, DomainError>;
}
