use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::models::{AnalysisStatus, LanguageStats, Repository};
use crate::domain::DomainError;

/// Port for repository metadata persistence.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Inserts or fully replaces a repository record.
    async fn save(&self, repository: &Repository) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError>;

    async fn find_by_origin(&self, origin_url: &str) -> Result<Option<Repository>, DomainError>;

    /// All repositories, newest first.
    async fn list_all(&self) -> Result<Vec<Repository>, DomainError>;

    async fn delete(&self, id: &str) -> Result<(), DomainError>;

    /// Writes a status snapshot. Snapshots are monotonic per repository;
    /// callers serialize their own writes.
    async fn update_status(
        &self,
        id: &str,
        status: AnalysisStatus,
        message: &str,
    ) -> Result<(), DomainError>;

    async fn update_stats(
        &self,
        id: &str,
        file_count: u64,
        chunk_count: u64,
        languages: &HashMap<String, LanguageStats>,
    ) -> Result<(), DomainError>;

    /// Records the embedding model identifier the current index was built
    /// with.
    async fn record_embedding_model(&self, id: &str, model: &str) -> Result<(), DomainError>;
}
