use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::GraphRepository;
use crate::domain::{
    DomainError, EdgeRelation, GraphData, GraphEdge, GraphNode, GraphNodeType, Language, SymbolKind,
};

pub struct DuckdbGraphRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbGraphRepository {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Joins an existing shared connection. The caller runs
    /// [`Self::initialize_schema`] before wrapping the connection.
    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                repository_id TEXT NOT NULL,
                id TEXT NOT NULL,
                label TEXT NOT NULL,
                node_type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                language TEXT,
                symbol_kind TEXT,
                start_line INTEGER,
                end_line INTEGER,
                PRIMARY KEY (repository_id, id)
            );

            CREATE TABLE IF NOT EXISTS graph_edges (
                repository_id TEXT NOT NULL,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                relation TEXT NOT NULL,
                PRIMARY KEY (repository_id, source, target, relation)
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize graph schema: {}", e)))?;

        debug!("DuckDB graph schema initialized");
        Ok(())
    }
}

#[async_trait]
impl GraphRepository for DuckdbGraphRepository {
    async fn replace(&self, repository_id: &str, graph: &GraphData) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM graph_nodes WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear graph nodes: {}", e)))?;
        tx.execute(
            "DELETE FROM graph_edges WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear graph edges: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO graph_nodes \
                     (repository_id, id, label, node_type, file_path, language, symbol_kind, start_line, end_line) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare node insert: {}", e)))?;

            for node in &graph.nodes {
                stmt.execute(params![
                    repository_id,
                    node.id,
                    node.label,
                    node.node_type.as_str(),
                    node.file_path,
                    node.language.map(|l| l.as_str()),
                    node.symbol_kind.map(|k| k.as_str()),
                    node.start_line.map(|l| l as i64),
                    node.end_line.map(|l| l as i64),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert graph node {}: {}", node.id, e))
                })?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO graph_edges (repository_id, source, target, relation) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare edge insert: {}", e)))?;

            for edge in &graph.edges {
                stmt.execute(params![
                    repository_id,
                    edge.source,
                    edge.target,
                    edge.relation.as_str(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to insert graph edge {} -> {}: {}",
                        edge.source, edge.target, e
                    ))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!(
            "Stored graph with {} nodes and {} edges for {}",
            graph.node_count(),
            graph.edge_count(),
            repository_id
        );
        Ok(())
    }

    async fn load(&self, repository_id: &str) -> Result<GraphData, DomainError> {
        let conn = self.conn.lock().await;

        let mut node_stmt = conn
            .prepare(
                "SELECT id, label, node_type, file_path, language, symbol_kind, start_line, end_line \
                 FROM graph_nodes WHERE repository_id = ?1 ORDER BY id",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let node_rows = node_stmt
            .query_map(params![repository_id], |row| {
                let node_type: String = row.get(2)?;
                let language: Option<String> = row.get(4)?;
                let symbol_kind: Option<String> = row.get(5)?;
                Ok(GraphNode {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    node_type: GraphNodeType::parse(&node_type),
                    file_path: row.get(3)?,
                    language: language.map(|l| Language::parse(&l)),
                    symbol_kind: symbol_kind.map(|k| SymbolKind::parse(&k)),
                    start_line: row.get::<_, Option<i64>>(6)?.map(|l| l as u32),
                    end_line: row.get::<_, Option<i64>>(7)?.map(|l| l as u32),
                })
            })
            .map_err(|e| DomainError::storage(format!("Failed to query graph nodes: {}", e)))?;

        let mut nodes = Vec::new();
        for row in node_rows {
            nodes
                .push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }

        let mut edge_stmt = conn
            .prepare(
                "SELECT source, target, relation FROM graph_edges WHERE repository_id = ?1",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let edge_rows = edge_stmt
            .query_map(params![repository_id], |row| {
                let source: String = row.get(0)?;
                let target: String = row.get(1)?;
                let relation: String = row.get(2)?;
                Ok((source, target, relation))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query graph edges: {}", e)))?;

        let mut edges = Vec::new();
        for row in edge_rows {
            let (source, target, relation) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            let relation = EdgeRelation::parse(&relation).ok_or_else(|| {
                DomainError::storage(format!("Unknown edge relation '{}' in store", relation))
            })?;
            edges.push(GraphEdge::new(source, target, relation));
        }
        edges.sort_by(|a, b| {
            (a.relation, &a.source, &a.target).cmp(&(b.relation, &b.source, &b.target))
        });

        Ok(GraphData { nodes, edges })
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        tx.execute(
            "DELETE FROM graph_nodes WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete graph nodes: {}", e)))?;
        tx.execute(
            "DELETE FROM graph_edges WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete graph edges: {}", e)))?;
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> GraphData {
        GraphData {
            nodes: vec![
                GraphNode::file("src/a.py", Language::Python),
                GraphNode::file("src/b.py", Language::Python),
                GraphNode::symbol("src/a.py#foo@1", "foo", SymbolKind::Function, "src/a.py", 1, 3),
            ],
            edges: vec![
                GraphEdge::new(
                    "file:src/b.py".to_string(),
                    "file:src/a.py".to_string(),
                    EdgeRelation::Imports,
                ),
                GraphEdge::new(
                    "file:src/a.py".to_string(),
                    "sym:src/a.py#foo@1".to_string(),
                    EdgeRelation::Contains,
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_replace_and_load_roundtrip() {
        let store = DuckdbGraphRepository::in_memory().unwrap();
        let graph = sample_graph();

        store.replace("repo-1", &graph).await.unwrap();
        let loaded = store.load("repo-1").await.unwrap();

        assert_eq!(loaded.node_count(), 3);
        assert_eq!(loaded.edge_count(), 2);

        let symbol = loaded.find_node("sym:src/a.py#foo@1").unwrap();
        assert_eq!(symbol.label, "foo");
        assert_eq!(symbol.symbol_kind, Some(SymbolKind::Function));
        assert_eq!(symbol.start_line, Some(1));

        let file = loaded.find_node("file:src/a.py").unwrap();
        assert_eq!(file.language, Some(Language::Python));
        assert_eq!(file.symbol_kind, None);
    }

    #[tokio::test]
    async fn test_load_missing_repository_is_empty() {
        let store = DuckdbGraphRepository::in_memory().unwrap();
        let loaded = store.load("missing").await.unwrap();

        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_load_orders_deterministically() {
        let store = DuckdbGraphRepository::in_memory().unwrap();
        store.replace("repo-1", &sample_graph()).await.unwrap();

        let first = store.load("repo-1").await.unwrap();
        let second = store.load("repo-1").await.unwrap();

        assert_eq!(first, second);
        // Imports sorts before Contains.
        assert_eq!(first.edges[0].relation, EdgeRelation::Imports);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_graph() {
        let store = DuckdbGraphRepository::in_memory().unwrap();
        store.replace("repo-1", &sample_graph()).await.unwrap();

        let smaller = GraphData {
            nodes: vec![GraphNode::file("only.py", Language::Python)],
            edges: vec![],
        };
        store.replace("repo-1", &smaller).await.unwrap();

        let loaded = store.load("repo-1").await.unwrap();
        assert_eq!(loaded.node_count(), 1);
        assert_eq!(loaded.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_by_repository() {
        let store = DuckdbGraphRepository::in_memory().unwrap();
        store.replace("repo-1", &sample_graph()).await.unwrap();

        store.delete_by_repository("repo-1").await.unwrap();

        assert!(store.load("repo-1").await.unwrap().is_empty());
    }
}
