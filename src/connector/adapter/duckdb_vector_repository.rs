use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{
    CodeChunk, DomainError, Embedding, Language, SearchQuery, SearchResult, VECTOR_DIMENSIONS,
};

pub struct DuckdbVectorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbVectorRepository {
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

    /// Returns a clone of the shared connection Arc so other adapters can
    /// join the same database.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Creates tables and enables the VSS extension for HNSW search.
    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                repository_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                seq INTEGER NOT NULL,
                content TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                language TEXT NOT NULL,
                symbol_id TEXT,
                symbol_name TEXT
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                chunk_id TEXT PRIMARY KEY,
                vector FLOAT[{}] NOT NULL,
                model TEXT NOT NULL
            );
            ",
            VECTOR_DIMENSIONS
        ))
        .map_err(|e| DomainError::storage(format!("Failed to initialize vector tables: {}", e)))?;

        // VSS extension is required for vector search
        conn.execute_batch("INSTALL vss;")
            .map_err(|e| DomainError::storage(format!("Failed to INSTALL vss: {}", e)))?;
        conn.execute_batch("LOAD vss;")
            .map_err(|e| DomainError::storage(format!("Failed to LOAD vss: {}", e)))?;

        conn.execute_batch("SET hnsw_enable_experimental_persistence = true;")
            .map_err(|e| DomainError::storage(format!("Failed to set HNSW persistence: {}", e)))?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS embedding_hnsw_idx ON embeddings USING HNSW (vector) WITH (metric = 'cosine');",
        )
        .map_err(|e| DomainError::storage(format!("Failed to create HNSW index: {}", e)))?;

        debug!("DuckDB vector schema initialized");
        Ok(())
    }

    fn vector_to_array_literal(vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != VECTOR_DIMENSIONS {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                VECTOR_DIMENSIONS,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("{}", v));
        }
        s.push(']');
        s.push_str(&format!("::FLOAT[{}]", VECTOR_DIMENSIONS));
        Ok(s)
    }
}

#[async_trait]
impl VectorRepository for DuckdbVectorRepository {
    async fn replace_repository(
        &self,
        repository_id: &str,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError> {
        if chunks.len() != embeddings.len() {
            return Err(DomainError::invalid_input(
                "Chunk and embedding count mismatch".to_string(),
            ));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE repository_id = ?)",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear embeddings: {}", e)))?;
        tx.execute(
            "DELETE FROM chunks WHERE repository_id = ?",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear chunks: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks \
                     (id, repository_id, file_path, seq, content, start_line, end_line, language, symbol_id, symbol_name) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare chunk insert: {}", e)))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id(),
                    chunk.repository_id(),
                    chunk.file_path(),
                    chunk.seq() as i64,
                    chunk.content(),
                    chunk.start_line() as i64,
                    chunk.end_line() as i64,
                    chunk.language().as_str(),
                    chunk.symbol_id(),
                    chunk.symbol_name(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert chunk {}: {}", chunk.id(), e))
                })?;
            }
        }

        for embedding in embeddings {
            let array_lit = Self::vector_to_array_literal(&embedding.vector)?;
            // The array literal must be part of the SQL text: DuckDB's
            // FLOAT[N] type doesn't support parameterization. The literal is
            // built from numeric data, never user input.
            let sql = format!(
                "INSERT INTO embeddings (chunk_id, vector, model) VALUES (?, {}, ?)",
                array_lit
            );
            tx.execute(&sql, params![embedding.chunk_id, embedding.model])
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to insert embedding for chunk {}: {}",
                        embedding.chunk_id, e
                    ))
                })?;
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!(
            "Stored {} chunks and {} embeddings for {}",
            chunks.len(),
            embeddings.len(),
            repository_id
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let array_lit = Self::vector_to_array_literal(query_vector)?;
        let mut sql = format!(
            "SELECT \
                c.id, c.repository_id, c.file_path, c.seq, c.content, c.start_line, c.end_line, \
                c.language, c.symbol_id, c.symbol_name, \
                1.0 - array_cosine_distance(e.vector, {array_lit}) AS score \
            FROM embeddings e \
            JOIN chunks c ON c.id = e.chunk_id \
            ",
            array_lit = array_lit
        );

        let mut where_clauses: Vec<String> = Vec::new();
        if !query.languages().is_empty() {
            let quoted = query
                .languages()
                .iter()
                .map(|l| format!("'{}'", l.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            where_clauses.push(format!("c.language IN ({})", quoted));
        }
        if !query.repository_ids().is_empty() {
            let quoted = query
                .repository_ids()
                .iter()
                .map(|r| format!("'{}'", r.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            where_clauses.push(format!("c.repository_id IN ({})", quoted));
        }
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }

        sql.push_str(&format!(
            " ORDER BY array_cosine_distance(e.vector, {array_lit}) LIMIT ?",
            array_lit = array_lit
        ));

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let mut rows = stmt
            .query(params![query.limit() as i64])
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            let score: f32 = row
                .get(10)
                .map_err(|e| DomainError::storage(format!("Failed to read score: {}", e)))?;

            if let Some(min_score) = query.min_score() {
                if score < min_score {
                    continue;
                }
            }

            let language: String = row
                .get(7)
                .map_err(|e| DomainError::storage(format!("Failed to read language: {}", e)))?;
            let chunk = CodeChunk::reconstitute(
                row.get::<_, String>(0)
                    .map_err(|e| DomainError::storage(format!("Failed to read id: {}", e)))?,
                row.get::<_, String>(1).map_err(|e| {
                    DomainError::storage(format!("Failed to read repository_id: {}", e))
                })?,
                row.get::<_, String>(2)
                    .map_err(|e| DomainError::storage(format!("Failed to read file_path: {}", e)))?,
                row.get::<_, i64>(3)
                    .map_err(|e| DomainError::storage(format!("Failed to read seq: {}", e)))?
                    as u32,
                row.get::<_, String>(4)
                    .map_err(|e| DomainError::storage(format!("Failed to read content: {}", e)))?,
                row.get::<_, i64>(5)
                    .map_err(|e| DomainError::storage(format!("Failed to read start_line: {}", e)))?
                    as u32,
                row.get::<_, i64>(6)
                    .map_err(|e| DomainError::storage(format!("Failed to read end_line: {}", e)))?
                    as u32,
                Language::parse(&language),
                row.get::<_, Option<String>>(8)
                    .map_err(|e| DomainError::storage(format!("Failed to read symbol_id: {}", e)))?,
                row.get::<_, Option<String>>(9).map_err(|e| {
                    DomainError::storage(format!("Failed to read symbol_name: {}", e))
                })?,
            );

            results.push(SearchResult::new(chunk, score));
            if results.len() >= query.limit() {
                break;
            }
        }
        Ok(results)
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE repository_id = ?)",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        tx.execute(
            "DELETE FROM chunks WHERE repository_id = ?",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        Ok(count as usize)
    }

    async fn count_by_repository(&self, repository_id: &str) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE repository_id = ?",
                params![repository_id],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        Ok(count as usize)
    }
}
