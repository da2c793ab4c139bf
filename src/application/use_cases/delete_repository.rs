use std::sync::Arc;

use tracing::{info, warn};

use crate::application::interfaces::{
    FileRepository, GraphRepository, MetadataRepository, VectorRepository,
};
use crate::application::progress::ProgressHub;
use crate::application::use_cases::analyze_repository::AnalyzeRepositoryUseCase;
use crate::domain::DomainError;

/// Removes a repository and everything derived from it: vectors, graph,
/// file records, metadata, progress channel, and the on-disk checkout. A
/// running analysis is cancelled first, best effort.
pub struct DeleteRepositoryUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    graph_repo: Arc<dyn GraphRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    progress: Arc<ProgressHub>,
    analyze: Arc<AnalyzeRepositoryUseCase>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        file_repo: Arc<dyn FileRepository>,
        graph_repo: Arc<dyn GraphRepository>,
        vector_repo: Arc<dyn VectorRepository>,
        progress: Arc<ProgressHub>,
        analyze: Arc<AnalyzeRepositoryUseCase>,
    ) -> Self {
        Self {
            metadata_repo,
            file_repo,
            graph_repo,
            vector_repo,
            progress,
            analyze,
        }
    }

    pub async fn execute(&self, repository_id: &str) -> Result<(), DomainError> {
        let repository = self
            .metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })?;

        self.analyze.cancel_if_running(repository_id).await;

        self.vector_repo.delete_by_repository(repository_id).await?;
        self.graph_repo.delete_by_repository(repository_id).await?;
        self.file_repo.delete_by_repository(repository_id).await?;
        self.metadata_repo.delete(repository_id).await?;
        self.progress.remove(repository_id).await;

        let checkout = self.analyze.checkout_dir(repository_id);
        if let Err(e) = tokio::fs::remove_dir_all(&checkout).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove checkout {}: {}", checkout.display(), e);
            }
        }

        info!("Deleted repository {} ({})", repository_id, repository.name());
        Ok(())
    }
}
