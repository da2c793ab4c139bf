use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::MetadataRepository;
use crate::domain::{current_timestamp, AnalysisStatus, DomainError, LanguageStats, Repository};

const REPOSITORY_COLUMNS: &str = "id, name, owner, origin_url, status, status_message, \
     file_count, chunk_count, embedding_model, languages, created_at, updated_at";

pub struct DuckdbMetadataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbMetadataRepository {
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

    /// Joins an existing shared connection. DuckDB allows one write connection
    /// per file, so all adapters over the same database share one handle. The
    /// caller runs [`Self::initialize_schema`] before wrapping the connection.
    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Returns a clone of the shared connection Arc so other adapters can
    /// join the same database.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner TEXT,
                origin_url TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                status_message TEXT NOT NULL,
                file_count BIGINT DEFAULT 0,
                chunk_count BIGINT DEFAULT 0,
                embedding_model TEXT,
                languages TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB repositories schema initialized");
        Ok(())
    }

    fn serialize_languages(languages: &HashMap<String, LanguageStats>) -> Option<String> {
        if languages.is_empty() {
            None
        } else {
            serde_json::to_string(languages).ok()
        }
    }

    fn deserialize_languages(json: Option<String>) -> HashMap<String, LanguageStats> {
        json.and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn map_row(row: &duckdb::Row<'_>) -> Result<Repository, duckdb::Error> {
        let status: String = row.get(4)?;
        let languages_json: Option<String> = row.get(9)?;
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            AnalysisStatus::parse(&status),
            row.get(5)?,
            row.get::<_, i64>(6)? as u64,
            row.get::<_, i64>(7)? as u64,
            row.get(8)?,
            Self::deserialize_languages(languages_json),
            row.get(10)?,
            row.get(11)?,
        ))
    }
}

#[async_trait]
impl MetadataRepository for DuckdbMetadataRepository {
    async fn save(&self, repository: &Repository) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let languages_json = Self::serialize_languages(repository.languages());

        conn.execute(
            r#"
            INSERT INTO repositories (id, name, owner, origin_url, status, status_message,
                file_count, chunk_count, embedding_model, languages, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                owner = excluded.owner,
                origin_url = excluded.origin_url,
                status = excluded.status,
                status_message = excluded.status_message,
                file_count = excluded.file_count,
                chunk_count = excluded.chunk_count,
                embedding_model = excluded.embedding_model,
                languages = excluded.languages,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
            params![
                repository.id(),
                repository.name(),
                repository.owner(),
                repository.origin_url(),
                repository.status().as_str(),
                repository.status_message(),
                repository.file_count() as i64,
                repository.chunk_count() as i64,
                repository.embedding_model(),
                languages_json,
                repository.created_at(),
                repository.updated_at(),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save repository: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories WHERE id = ?1",
                REPOSITORY_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![id], Self::map_row) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository: {}",
                e
            ))),
        }
    }

    async fn find_by_origin(&self, origin_url: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories WHERE origin_url = ?1",
                REPOSITORY_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![origin_url], Self::map_row) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository by origin: {}",
                e
            ))),
        }
    }

    async fn list_all(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories ORDER BY created_at DESC, name",
                REPOSITORY_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map([], Self::map_row)
            .map_err(|e| DomainError::storage(format!("Failed to query repositories: {}", e)))?;

        let mut repos = Vec::new();
        for row in rows {
            repos
                .push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(repos)
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM repositories WHERE id = ?1", params![id])
            .map_err(|e| DomainError::storage(format!("Failed to delete repository: {}", e)))?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: AnalysisStatus,
        message: &str,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE repositories SET status = ?1, status_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), message, current_timestamp(), id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to update repository status: {}", e)))?;

        Ok(())
    }

    async fn update_stats(
        &self,
        id: &str,
        file_count: u64,
        chunk_count: u64,
        languages: &HashMap<String, LanguageStats>,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let languages_json = Self::serialize_languages(languages);

        conn.execute(
            "UPDATE repositories SET file_count = ?1, chunk_count = ?2, languages = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                file_count as i64,
                chunk_count as i64,
                languages_json,
                current_timestamp(),
                id
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to update repository stats: {}", e)))?;

        Ok(())
    }

    async fn record_embedding_model(&self, id: &str, model: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE repositories SET embedding_model = ?1, updated_at = ?2 WHERE id = ?3",
            params![model, current_timestamp(), id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to record embedding model: {}", e)))?;

        Ok(())
    }
}
