use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::application::interfaces::{GraphRepository, MetadataRepository};
use crate::domain::models::{GraphEdge, GraphNode, GraphNodeType};
use crate::domain::DomainError;

/// Files grouped by their top-level directory, for coarse navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleGroup {
    pub name: String,
    pub file_count: usize,
    pub files: Vec<String>,
}

/// The structure graph served to clients: every node and edge plus a module
/// grouping derived from file paths.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub modules: Vec<ModuleGroup>,
}

pub struct RepositoryGraphUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    graph_repo: Arc<dyn GraphRepository>,
}

impl RepositoryGraphUseCase {
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        graph_repo: Arc<dyn GraphRepository>,
    ) -> Self {
        Self {
            metadata_repo,
            graph_repo,
        }
    }

    pub async fn execute(&self, repository_id: &str) -> Result<GraphView, DomainError> {
        let repository = self
            .metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })?;
        if !repository.is_queryable() {
            return Err(DomainError::not_ready(format!(
                "Repository {} has no graph yet (status: {})",
                repository_id,
                repository.status()
            )));
        }

        let graph = self.graph_repo.load(repository_id).await?;
        let modules = group_modules(&graph.nodes);
        Ok(GraphView {
            nodes: graph.nodes,
            edges: graph.edges,
            modules,
        })
    }
}

/// Groups file nodes by their first path component; root-level files land
/// in "(root)". Groups and their files are sorted.
fn group_modules(nodes: &[GraphNode]) -> Vec<ModuleGroup> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes {
        if node.node_type != GraphNodeType::File {
            continue;
        }
        let module = match node.file_path.split_once('/') {
            Some((top, _)) => top.to_string(),
            None => "(root)".to_string(),
        };
        groups.entry(module).or_default().push(node.file_path.clone());
    }

    groups
        .into_iter()
        .map(|(name, mut files)| {
            files.sort();
            ModuleGroup {
                file_count: files.len(),
                name,
                files,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Language;

    #[test]
    fn test_group_modules_by_top_directory() {
        let nodes = vec![
            GraphNode::file("src/app.py", Language::Python),
            GraphNode::file("src/util.py", Language::Python),
            GraphNode::file("tests/test_app.py", Language::Python),
            GraphNode::file("setup.py", Language::Python),
        ];

        let modules = group_modules(&nodes);

        assert_eq!(modules.len(), 3);
        assert_eq!(modules[0].name, "(root)");
        assert_eq!(modules[0].files, vec!["setup.py"]);
        assert_eq!(modules[1].name, "src");
        assert_eq!(modules[1].file_count, 2);
        assert_eq!(modules[2].name, "tests");
    }

    #[test]
    fn test_symbol_nodes_are_not_grouped() {
        let nodes = vec![GraphNode::symbol(
            "src/app.py#main@1",
            "main",
            crate::domain::models::SymbolKind::Function,
            "src/app.py",
            1,
            10,
        )];

        assert!(group_modules(&nodes).is_empty());
    }
}
