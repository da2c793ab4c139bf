use async_trait::async_trait;

use crate::domain::models::GraphData;
use crate::domain::DomainError;

/// Port for the persisted structure graph.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Atomically replaces a repository's graph.
    async fn replace(&self, repository_id: &str, graph: &GraphData) -> Result<(), DomainError>;

    /// Loads the graph in deterministic order (nodes by id, edges by
    /// relation then endpoints). Missing repositories yield an empty graph.
    async fn load(&self, repository_id: &str) -> Result<GraphData, DomainError>;

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError>;
}
