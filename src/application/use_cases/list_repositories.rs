use std::sync::Arc;

use crate::application::interfaces::MetadataRepository;
use crate::domain::models::Repository;
use crate::domain::DomainError;

/// Read access to repository records.
pub struct ListRepositoriesUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
}

impl ListRepositoriesUseCase {
    pub fn new(metadata_repo: Arc<dyn MetadataRepository>) -> Self {
        Self { metadata_repo }
    }

    /// All repositories, newest first.
    pub async fn execute(&self) -> Result<Vec<Repository>, DomainError> {
        self.metadata_repo.list_all().await
    }

    pub async fn find(&self, repository_id: &str) -> Result<Repository, DomainError> {
        self.metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })
    }
}
