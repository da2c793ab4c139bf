use async_trait::async_trait;

use crate::domain::models::FileRecord;
use crate::domain::DomainError;

/// Port for persisted file records.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Atomically replaces every file record for a repository.
    async fn replace_all(
        &self,
        repository_id: &str,
        files: &[FileRecord],
    ) -> Result<(), DomainError>;

    /// File records sorted by path.
    async fn list_by_repository(&self, repository_id: &str)
        -> Result<Vec<FileRecord>, DomainError>;

    async fn find_by_path(
        &self,
        repository_id: &str,
        path: &str,
    ) -> Result<Option<FileRecord>, DomainError>;

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError>;
}
