use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::FileRepository;
use crate::domain::{DomainError, FileRecord, Language};

pub struct DuckdbFileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbFileRepository {
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
            CREATE TABLE IF NOT EXISTS files (
                repository_id TEXT NOT NULL,
                path TEXT NOT NULL,
                language TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                line_count BIGINT NOT NULL,
                content_hash TEXT NOT NULL,
                PRIMARY KEY (repository_id, path)
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize files schema: {}", e)))?;

        debug!("DuckDB files schema initialized");
        Ok(())
    }

    fn map_row(row: &duckdb::Row<'_>) -> Result<FileRecord, duckdb::Error> {
        let language: String = row.get(2)?;
        Ok(FileRecord::reconstitute(
            row.get(0)?,
            row.get(1)?,
            Language::parse(&language),
            row.get::<_, i64>(3)? as u64,
            row.get::<_, i64>(4)? as u64,
            row.get(5)?,
        ))
    }
}

#[async_trait]
impl FileRepository for DuckdbFileRepository {
    async fn replace_all(
        &self,
        repository_id: &str,
        files: &[FileRecord],
    ) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM files WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear file records: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO files (repository_id, path, language, size_bytes, line_count, content_hash) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare file insert: {}", e)))?;

            for file in files {
                stmt.execute(params![
                    file.repository_id(),
                    file.path(),
                    file.language().as_str(),
                    file.size_bytes() as i64,
                    file.line_count() as i64,
                    file.content_hash(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert file {}: {}", file.path(), e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Stored {} file records for {}", files.len(), repository_id);
        Ok(())
    }

    async fn list_by_repository(
        &self,
        repository_id: &str,
    ) -> Result<Vec<FileRecord>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repository_id, path, language, size_bytes, line_count, content_hash \
                 FROM files WHERE repository_id = ?1 ORDER BY path",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![repository_id], Self::map_row)
            .map_err(|e| DomainError::storage(format!("Failed to query files: {}", e)))?;

        let mut files = Vec::new();
        for row in rows {
            files
                .push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(files)
    }

    async fn find_by_path(
        &self,
        repository_id: &str,
        path: &str,
    ) -> Result<Option<FileRecord>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repository_id, path, language, size_bytes, line_count, content_hash \
                 FROM files WHERE repository_id = ?1 AND path = ?2",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![repository_id, path], Self::map_row) {
            Ok(file) => Ok(Some(file)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to query file: {}", e))),
        }
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM files WHERE repository_id = ?1",
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete file records: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(repo: &str, path: &str, content: &str) -> FileRecord {
        FileRecord::new(repo.to_string(), path.to_string(), content)
    }

    #[tokio::test]
    async fn test_replace_and_list_sorted() {
        let store = DuckdbFileRepository::in_memory().unwrap();

        store
            .replace_all(
                "repo-1",
                &[
                    record("repo-1", "src/b.py", "def b(): pass\n"),
                    record("repo-1", "src/a.py", "def a(): pass\n"),
                ],
            )
            .await
            .unwrap();

        let files = store.list_by_repository("repo-1").await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/b.py"]);
        assert_eq!(files[0].language(), Language::Python);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_run() {
        let store = DuckdbFileRepository::in_memory().unwrap();

        store
            .replace_all("repo-1", &[record("repo-1", "old.py", "x = 1\n")])
            .await
            .unwrap();
        store
            .replace_all("repo-1", &[record("repo-1", "new.py", "y = 2\n")])
            .await
            .unwrap();

        let files = store.list_by_repository("repo-1").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), "new.py");
    }

    #[tokio::test]
    async fn test_find_by_path() {
        let store = DuckdbFileRepository::in_memory().unwrap();
        store
            .replace_all("repo-1", &[record("repo-1", "src/app.py", "import os\n")])
            .await
            .unwrap();

        let found = store.find_by_path("repo-1", "src/app.py").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().line_count(), 1);

        assert!(store
            .find_by_path("repo-1", "missing.py")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_path("repo-2", "src/app.py")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_by_repository_scopes() {
        let store = DuckdbFileRepository::in_memory().unwrap();
        store
            .replace_all("repo-1", &[record("repo-1", "a.py", "a = 1\n")])
            .await
            .unwrap();
        store
            .replace_all("repo-2", &[record("repo-2", "b.py", "b = 2\n")])
            .await
            .unwrap();

        store.delete_by_repository("repo-1").await.unwrap();

        assert!(store.list_by_repository("repo-1").await.unwrap().is_empty());
        assert_eq!(store.list_by_repository("repo-2").await.unwrap().len(), 1);
    }
}
