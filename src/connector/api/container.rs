use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::interfaces::{
    ChatModel, EmbeddingService, FileRepository, GraphRepository, MetadataRepository,
    ParserService, SourceFetcher, VectorRepository,
};
use crate::application::progress::ProgressHub;
use crate::application::use_cases::{
    AnalysisConfig, AnalyzeRepositoryUseCase, AskRepositoryUseCase, BrowseRepositoryUseCase,
    DeleteRepositoryUseCase, ExplainFileUseCase, ListRepositoriesUseCase, RagConfig,
    RepositoryGraphUseCase,
};
use crate::connector::adapter::{
    DuckdbFileRepository, DuckdbGraphRepository, DuckdbMetadataRepository, DuckdbVectorRepository,
    GitFetcher, HttpEmbedding, InMemoryVectorRepository, MockChatModel, MockEmbedding, OpenAiChat,
    TreeSitterParser,
};

#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Root directory for the database and repository checkouts.
    pub data_dir: PathBuf,
    pub mock_embeddings: bool,
    pub mock_chat: bool,
    pub memory_storage: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.codeatlas"),
            mock_embeddings: false,
            mock_chat: false,
            memory_storage: false,
        }
    }
}

impl ContainerConfig {
    /// Reads configuration from `CODEATLAS_*` environment variables.
    /// Unset or unparsable variables keep their defaults; CLI flags
    /// override the result in `main`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CODEATLAS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("CODEATLAS_MOCK_EMBEDDINGS") {
            if let Ok(v) = val.parse() {
                config.mock_embeddings = v;
            }
        }
        if let Ok(val) = std::env::var("CODEATLAS_MOCK_CHAT") {
            if let Ok(v) = val.parse() {
                config.mock_chat = v;
            }
        }
        if let Ok(val) = std::env::var("CODEATLAS_MEMORY_STORAGE") {
            if let Ok(v) = val.parse() {
                config.memory_storage = v;
            }
        }

        config
    }
}

/// Wires adapters to use cases. Built once at startup and shared as axum
/// state; per-request use cases are constructed on demand from the shared
/// adapters.
pub struct Container {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    graph_repo: Arc<dyn GraphRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    chat_model: Arc<dyn ChatModel>,
    progress: Arc<ProgressHub>,
    /// Singleton: owns the analysis semaphore and cancellation tokens.
    analyze: Arc<AnalyzeRepositoryUseCase>,
    config: ContainerConfig,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.data_dir.join("codeatlas.duckdb");

        // One write connection per DuckDB file; all adapters share it.
        let conn = Connection::open(&db_path)
            .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", db_path.display(), e))?;
        DuckdbMetadataRepository::initialize_schema(&conn)?;
        DuckdbFileRepository::initialize_schema(&conn)?;
        DuckdbGraphRepository::initialize_schema(&conn)?;

        // Vector storage: the VSS extension install can fail offline, so a
        // failed schema init degrades to in-memory vectors while metadata
        // stays on disk.
        let duckdb_vectors = if config.memory_storage {
            false
        } else {
            match DuckdbVectorRepository::initialize_schema(&conn) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize DuckDB vector storage ({}): {}. Falling back to in-memory storage.",
                        db_path.display(),
                        e
                    );
                    false
                }
            }
        };

        let shared_conn = Arc::new(Mutex::new(conn));
        let metadata_repo: Arc<dyn MetadataRepository> = Arc::new(
            DuckdbMetadataRepository::with_connection(Arc::clone(&shared_conn)),
        );
        let file_repo: Arc<dyn FileRepository> = Arc::new(DuckdbFileRepository::with_connection(
            Arc::clone(&shared_conn),
        ));
        let graph_repo: Arc<dyn GraphRepository> = Arc::new(DuckdbGraphRepository::with_connection(
            Arc::clone(&shared_conn),
        ));

        let vector_repo: Arc<dyn VectorRepository> = if duckdb_vectors {
            debug!("Using DuckDB vector storage at {:?}", db_path);
            Arc::new(DuckdbVectorRepository::with_connection(Arc::clone(
                &shared_conn,
            )))
        } else {
            debug!("Using in-memory vector storage");
            Arc::new(InMemoryVectorRepository::new())
        };

        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::new())
        } else {
            debug!("Using HTTP embedding service");
            Arc::new(HttpEmbedding::from_env())
        };

        let chat_model: Arc<dyn ChatModel> = if config.mock_chat {
            debug!("Using mock chat model");
            Arc::new(MockChatModel::new())
        } else {
            debug!("Using OpenAI-compatible chat model");
            Arc::new(OpenAiChat::from_env())
        };

        let source_fetcher: Arc<dyn SourceFetcher> = Arc::new(GitFetcher::new());
        let parser_service: Arc<dyn ParserService> = Arc::new(TreeSitterParser::new());
        let progress = Arc::new(ProgressHub::new());

        let analysis_config = AnalysisConfig {
            data_dir: config.data_dir.clone(),
            ..AnalysisConfig::default()
        };
        let analyze = Arc::new(AnalyzeRepositoryUseCase::new(
            Arc::clone(&metadata_repo),
            Arc::clone(&file_repo),
            Arc::clone(&graph_repo),
            Arc::clone(&vector_repo),
            source_fetcher,
            parser_service,
            Arc::clone(&embedding_service),
            Arc::clone(&progress),
            analysis_config,
        ));

        Ok(Self {
            metadata_repo,
            file_repo,
            graph_repo,
            vector_repo,
            embedding_service,
            chat_model,
            progress,
            analyze,
            config,
        })
    }

    pub fn analyze_use_case(&self) -> Arc<AnalyzeRepositoryUseCase> {
        Arc::clone(&self.analyze)
    }

    pub fn ask_use_case(&self) -> AskRepositoryUseCase {
        AskRepositoryUseCase::new(
            Arc::clone(&self.metadata_repo),
            Arc::clone(&self.vector_repo),
            Arc::clone(&self.embedding_service),
            Arc::clone(&self.chat_model),
            RagConfig::default(),
        )
    }

    pub fn browse_use_case(&self) -> BrowseRepositoryUseCase {
        BrowseRepositoryUseCase::new(
            Arc::clone(&self.metadata_repo),
            Arc::clone(&self.file_repo),
            self.checkouts_dir(),
        )
    }

    pub fn explain_use_case(&self) -> ExplainFileUseCase {
        ExplainFileUseCase::new(
            Arc::clone(&self.metadata_repo),
            Arc::clone(&self.file_repo),
            Arc::clone(&self.graph_repo),
            Arc::clone(&self.chat_model),
            self.checkouts_dir(),
        )
    }

    pub fn list_use_case(&self) -> ListRepositoriesUseCase {
        ListRepositoriesUseCase::new(Arc::clone(&self.metadata_repo))
    }

    pub fn delete_use_case(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            Arc::clone(&self.metadata_repo),
            Arc::clone(&self.file_repo),
            Arc::clone(&self.graph_repo),
            Arc::clone(&self.vector_repo),
            Arc::clone(&self.progress),
            Arc::clone(&self.analyze),
        )
    }

    pub fn graph_use_case(&self) -> RepositoryGraphUseCase {
        RepositoryGraphUseCase::new(Arc::clone(&self.metadata_repo), Arc::clone(&self.graph_repo))
    }

    pub fn progress(&self) -> Arc<ProgressHub> {
        Arc::clone(&self.progress)
    }

    pub fn checkouts_dir(&self) -> PathBuf {
        self.config.data_dir.join("checkouts")
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }

    pub fn memory_storage(&self) -> bool {
        self.config.memory_storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContainerConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("~/.codeatlas"));
        assert!(!config.mock_embeddings);
        assert!(!config.mock_chat);
        assert!(!config.memory_storage);
    }

    #[tokio::test]
    async fn test_container_wires_with_mocks() {
        let dir = tempfile::tempdir().unwrap();
        let config = ContainerConfig {
            data_dir: dir.path().to_path_buf(),
            mock_embeddings: true,
            mock_chat: true,
            memory_storage: true,
        };

        let container = Container::new(config).unwrap();

        let repositories = container.list_use_case().execute().await.unwrap();
        assert!(repositories.is_empty());
        assert!(container.checkouts_dir().ends_with("checkouts"));
    }
}
