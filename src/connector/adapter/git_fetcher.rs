use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::application::SourceFetcher;
use crate::domain::DomainError;

/// Clones repositories with libgit2. The clone itself is blocking, so it
/// runs on the blocking pool.
pub struct GitFetcher;

impl GitFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, origin_url: &str, dest: &Path) -> Result<(), DomainError> {
        let url = origin_url.to_string();
        let target = dest.to_path_buf();

        info!("Cloning {} into {}", url, target.display());
        let start = Instant::now();

        let clone_url = url.clone();
        tokio::task::spawn_blocking(move || {
            git2::Repository::clone(&clone_url, &target).map(|_| ())
        })
        .await
        .map_err(|e| DomainError::internal(format!("Clone task panicked: {}", e)))?
        .map_err(|e| DomainError::fetch(e.message().to_string()))?;

        info!(
            "Clone of {} complete in {:.2}s",
            url,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_invalid_url_surfaces_git_message() {
        let fetcher = GitFetcher::new();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("checkout");

        let err = fetcher
            .fetch("file:///nonexistent/repo.git", &dest)
            .await
            .unwrap_err();

        assert!(err.is_fetch_error());
        // The upstream libgit2 message comes through unchanged.
        assert!(!err.to_string().is_empty());
    }
}
