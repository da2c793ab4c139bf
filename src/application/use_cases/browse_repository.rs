use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::application::interfaces::{FileRepository, MetadataRepository};
use crate::domain::models::{FileRecord, Language};
use crate::domain::DomainError;

/// Raw file content with metadata, served from the repository checkout.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub language: Language,
    pub line_count: u64,
    pub content: String,
}

/// Lists analyzed files and serves their content from the on-disk checkout.
pub struct BrowseRepositoryUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    checkouts_dir: PathBuf,
}

impl BrowseRepositoryUseCase {
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        file_repo: Arc<dyn FileRepository>,
        checkouts_dir: PathBuf,
    ) -> Self {
        Self {
            metadata_repo,
            file_repo,
            checkouts_dir,
        }
    }

    pub async fn list_files(&self, repository_id: &str) -> Result<Vec<FileRecord>, DomainError> {
        self.require_repository(repository_id).await?;
        self.file_repo.list_by_repository(repository_id).await
    }

    pub async fn file_content(
        &self,
        repository_id: &str,
        path: &str,
    ) -> Result<FileContent, DomainError> {
        self.require_repository(repository_id).await?;

        let record = self
            .file_repo
            .find_by_path(repository_id, path)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("File {} not found in repository", path))
            })?;

        let root = self.checkouts_dir.join(repository_id);
        let content = read_checkout_file(&root, path).await?;

        Ok(FileContent {
            path: record.path().to_string(),
            language: record.language(),
            line_count: record.line_count(),
            content,
        })
    }

    async fn require_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        self.metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })?;
        Ok(())
    }
}

/// Reads a file from a checkout, rejecting paths that escape the checkout
/// root via `..` segments or absolute components.
pub async fn read_checkout_file(root: &Path, relative: &str) -> Result<String, DomainError> {
    let candidate = root.join(relative);

    let root = root
        .canonicalize()
        .map_err(|_| DomainError::not_found("Repository checkout not found on disk"))?;
    let resolved = candidate
        .canonicalize()
        .map_err(|_| DomainError::not_found(format!("File {} not found on disk", relative)))?;

    if !resolved.starts_with(&root) {
        return Err(DomainError::invalid_input(format!(
            "Path {} escapes the repository root",
            relative
        )));
    }

    Ok(tokio::fs::read_to_string(&resolved).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_checkout_file_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("checkout");
        tokio::fs::create_dir_all(&root).await.unwrap();
        tokio::fs::write(root.join("inside.txt"), "inside").await.unwrap();
        tokio::fs::write(dir.path().join("secret.txt"), "secret").await.unwrap();

        let ok = read_checkout_file(&root, "inside.txt").await.unwrap();
        assert_eq!(ok, "inside");

        let escape = read_checkout_file(&root, "../secret.txt").await;
        assert!(escape.is_err());
    }

    #[tokio::test]
    async fn test_read_checkout_file_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let result = read_checkout_file(dir.path(), "nope.txt").await;

        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }
}
