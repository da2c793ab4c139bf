use std::path::Path;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Port for fetching repository sources into a local working directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Clones `origin_url` into `dest`. The destination must not already
    /// contain a checkout; callers clean up stale directories first.
    async fn fetch(&self, origin_url: &str, dest: &Path) -> Result<(), DomainError>;
}
