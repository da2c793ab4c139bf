//! End-to-end pipeline tests: submit, analyze, query, cancel, delete.
//!
//! External services are replaced by deterministic test doubles; storage
//! uses in-memory DuckDB connections and the in-memory vector store.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use codeatlas::domain::models::{
    AnalysisStatus, ChatTurn, CodeChunk, EdgeRelation, Embedding, EmbeddingConfig, Repository,
    StatusUpdate,
};
use codeatlas::{
    AnalysisConfig, AnalyzeRepositoryUseCase, AskRepositoryUseCase, DeleteRepositoryUseCase,
    DomainError, DuckdbFileRepository, DuckdbGraphRepository, DuckdbMetadataRepository,
    EmbeddingService, FileRepository, GraphRepository, InMemoryVectorRepository,
    MetadataRepository, MockChatModel, MockEmbedding, ProgressHub, RagConfig, SourceFetcher,
    TreeSitterParser, VectorRepository,
};

const SAMPLE_A: &str = "def foo():\n    return 1\n\n\nclass Base:\n    def ping(self):\n        return \"pong\"\n";
const SAMPLE_B: &str = "import a\n\n\nclass Child(Base):\n    def run(self):\n        return foo()\n";

fn sample_tree() -> Vec<(&'static str, &'static str)> {
    vec![("a.py", SAMPLE_A), ("b.py", SAMPLE_B)]
}

async fn write_tree(dest: &Path, files: &[(&str, &str)]) -> Result<(), DomainError> {
    for (path, content) in files {
        let full = dest.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
    }
    Ok(())
}

/// Fetcher that materializes a fixed file tree instead of cloning.
struct TreeFetcher {
    files: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl SourceFetcher for TreeFetcher {
    async fn fetch(&self, _origin_url: &str, dest: &Path) -> Result<(), DomainError> {
        write_tree(dest, &self.files).await
    }
}

struct FailingFetcher;

#[async_trait]
impl SourceFetcher for FailingFetcher {
    async fn fetch(&self, _origin_url: &str, _dest: &Path) -> Result<(), DomainError> {
        Err(DomainError::fetch("Remote repository does not exist"))
    }
}

/// Fetcher that takes a while, keeping the analysis in `cloning` long
/// enough for a test to act mid-run.
struct SlowFetcher {
    delay: Duration,
    files: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl SourceFetcher for SlowFetcher {
    async fn fetch(&self, _origin_url: &str, dest: &Path) -> Result<(), DomainError> {
        tokio::time::sleep(self.delay).await;
        write_tree(dest, &self.files).await
    }
}

/// Embedding service whose first `embed_chunks` calls fail, then delegate
/// to the deterministic mock.
struct FlakyEmbedding {
    inner: MockEmbedding,
    failures_left: AtomicUsize,
}

impl FlakyEmbedding {
    fn failing_once() -> Self {
        Self {
            inner: MockEmbedding::new(),
            failures_left: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl EmbeddingService for FlakyEmbedding {
    async fn embed_chunk(&self, chunk: &CodeChunk) -> Result<Embedding, DomainError> {
        self.inner.embed_chunk(chunk).await
    }

    async fn embed_chunks(&self, chunks: &[CodeChunk]) -> Result<Vec<Embedding>, DomainError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(DomainError::embedding("Transient embedding failure"));
        }
        self.inner.embed_chunks(chunks).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        self.inner.embed_query(query).await
    }

    fn config(&self) -> &EmbeddingConfig {
        self.inner.config()
    }
}

struct TestEnv {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    graph_repo: Arc<dyn GraphRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    chat_model: Arc<MockChatModel>,
    progress: Arc<ProgressHub>,
    workdir: TempDir,
}

fn setup_test_env() -> TestEnv {
    TestEnv {
        metadata_repo: Arc::new(DuckdbMetadataRepository::in_memory().expect("metadata store")),
        file_repo: Arc::new(DuckdbFileRepository::in_memory().expect("file store")),
        graph_repo: Arc::new(DuckdbGraphRepository::in_memory().expect("graph store")),
        vector_repo: Arc::new(InMemoryVectorRepository::new()),
        chat_model: Arc::new(MockChatModel::new()),
        progress: Arc::new(ProgressHub::new()),
        workdir: tempfile::tempdir().expect("tempdir"),
    }
}

impl TestEnv {
    fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            data_dir: self.workdir.path().to_path_buf(),
            embed_backoff_base: Duration::from_millis(10),
            ..AnalysisConfig::default()
        }
    }

    fn analyzer(
        &self,
        fetcher: Arc<dyn SourceFetcher>,
        embedding: Arc<dyn EmbeddingService>,
    ) -> Arc<AnalyzeRepositoryUseCase> {
        self.analyzer_with(fetcher, embedding, self.analysis_config())
    }

    fn analyzer_with(
        &self,
        fetcher: Arc<dyn SourceFetcher>,
        embedding: Arc<dyn EmbeddingService>,
        config: AnalysisConfig,
    ) -> Arc<AnalyzeRepositoryUseCase> {
        Arc::new(AnalyzeRepositoryUseCase::new(
            self.metadata_repo.clone(),
            self.file_repo.clone(),
            self.graph_repo.clone(),
            self.vector_repo.clone(),
            fetcher,
            Arc::new(TreeSitterParser::new()),
            embedding,
            self.progress.clone(),
            config,
        ))
    }

    fn asker(&self, embedding: Arc<dyn EmbeddingService>) -> AskRepositoryUseCase {
        AskRepositoryUseCase::new(
            self.metadata_repo.clone(),
            self.vector_repo.clone(),
            embedding,
            self.chat_model.clone(),
            RagConfig::default(),
        )
    }

    async fn wait_for_terminal(&self, repository_id: &str) -> Repository {
        for _ in 0..400 {
            let repository = self
                .metadata_repo
                .find_by_id(repository_id)
                .await
                .expect("find_by_id")
                .expect("repository exists");
            if repository.status().is_terminal() {
                return repository;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("analysis did not reach a terminal status");
    }
}

#[tokio::test]
async fn test_analysis_completes_and_builds_graph() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(MockEmbedding::new()),
    );

    let submitted = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("submit");
    assert_eq!(submitted.status(), AnalysisStatus::Pending);

    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);
    assert_eq!(repository.file_count(), 2);
    assert!(repository.chunk_count() > 0);
    assert_eq!(repository.embedding_model(), Some("mock-embedding"));
    assert_eq!(repository.languages()["python"].file_count, 2);

    let files = env
        .file_repo
        .list_by_repository(repository.id())
        .await
        .expect("list files");
    let paths: Vec<&str> = files.iter().map(|f| f.path()).collect();
    assert_eq!(paths, vec!["a.py", "b.py"]);

    // 2 file nodes plus foo, Base and Base.ping from a.py and Child and
    // Child.run from b.py.
    let graph = env.graph_repo.load(repository.id()).await.expect("load graph");
    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.edge_count(), 7);

    let imports: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| e.relation == EdgeRelation::Imports)
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].source, "file:b.py");
    assert_eq!(imports[0].target, "file:a.py");

    let extends: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| e.relation == EdgeRelation::Extends)
        .collect();
    assert_eq!(extends.len(), 1);
    assert!(extends[0].source.starts_with("sym:b.py#Child@"));
    assert!(extends[0].target.starts_with("sym:a.py#Base@"));

    let contains = graph
        .edges
        .iter()
        .filter(|e| e.relation == EdgeRelation::Contains)
        .count();
    assert_eq!(contains, 5);

    let stored = env
        .vector_repo
        .count_by_repository(repository.id())
        .await
        .expect("count");
    assert_eq!(stored as u64, repository.chunk_count());
}

#[tokio::test]
async fn test_progress_updates_are_monotonic() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(MockEmbedding::new()),
    );

    let submitted = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("submit");
    let mut receiver = env.progress.subscribe(submitted.id()).await;

    let mut updates: Vec<StatusUpdate> = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await {
            Ok(Ok(update)) => {
                let terminal = update.is_terminal();
                updates.push(update);
                if terminal {
                    break;
                }
            }
            Ok(Err(e)) => panic!("progress channel failed: {}", e),
            Err(_) => panic!("timed out waiting for progress updates"),
        }
    }

    assert!(updates.len() >= 3);
    assert_eq!(updates[0].status, AnalysisStatus::Cloning);
    assert_eq!(updates.last().map(|u| u.status), Some(AnalysisStatus::Completed));
    for pair in updates.windows(2) {
        assert!(
            pair[0].status.stage_order() <= pair[1].status.stage_order(),
            "status went backwards: {} -> {}",
            pair[0].status,
            pair[1].status
        );
    }
}

#[tokio::test]
async fn test_question_answering_over_indexed_repository() {
    let env = setup_test_env();
    let embedding: Arc<MockEmbedding> = Arc::new(MockEmbedding::new());
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        embedding.clone(),
    );

    let submitted = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("submit");
    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);

    let ask = env.asker(embedding);
    let answer = ask
        .execute(repository.id(), "What does foo return?", &[])
        .await
        .expect("ask");

    assert!(!answer.answer.is_empty());
    assert!(!answer.sources.is_empty());
    assert_eq!(env.chat_model.calls(), 1);

    // A follow-up carrying history reaches the model again.
    let history = vec![
        ChatTurn::user("What does foo return?"),
        ChatTurn::assistant(&answer.answer),
    ];
    ask.execute(repository.id(), "Where is it defined?", &history)
        .await
        .expect("follow-up");
    assert_eq!(env.chat_model.calls(), 2);
}

#[tokio::test]
async fn test_question_without_retrievable_context_gets_canned_answer() {
    let env = setup_test_env();
    let embedding: Arc<MockEmbedding> = Arc::new(MockEmbedding::new());
    // A file too small to produce a single chunk: analysis completes with an
    // empty vector partition.
    let analyze = env.analyzer(
        Arc::new(TreeFetcher {
            files: vec![("tiny.py", "x = 1\n")],
        }),
        embedding.clone(),
    );

    let submitted = analyze
        .submit("https://example.com/acme/tiny.git")
        .await
        .expect("submit");
    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);
    assert_eq!(repository.chunk_count(), 0);

    let ask = env.asker(embedding);
    let answer = ask
        .execute(repository.id(), "What does this repository do?", &[])
        .await
        .expect("ask");

    assert!(answer.sources.is_empty());
    assert!(answer.answer.contains("could not find"));
    assert_eq!(env.chat_model.calls(), 0);
}

#[tokio::test]
async fn test_clone_failure_marks_repository_failed() {
    let env = setup_test_env();
    let analyze = env.analyzer(Arc::new(FailingFetcher), Arc::new(MockEmbedding::new()));

    let submitted = analyze
        .submit("https://example.com/acme/missing.git")
        .await
        .expect("submit");

    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Failed);
    assert!(
        repository.status_message().contains("Remote repository does not exist"),
        "fetch error should surface verbatim, got: {}",
        repository.status_message()
    );

    // Nothing was indexed.
    assert_eq!(env.vector_repo.count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_embedding_retry_indexes_chunks_exactly_once() {
    let env = setup_test_env();
    // One chunk per batch, so the first of several batches fails and is
    // retried while the rest succeed on their first attempt.
    let mut config = env.analysis_config();
    config.embed_batch_size = 1;
    let analyze = env.analyzer_with(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(FlakyEmbedding::failing_once()),
        config,
    );

    let submitted = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("submit");

    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);

    let stored = env
        .vector_repo
        .count_by_repository(repository.id())
        .await
        .expect("count");
    assert_eq!(stored as u64, repository.chunk_count());
    assert_eq!(
        env.vector_repo.count().await.expect("total count"),
        stored,
        "retried batches must not be stored twice"
    );
}

#[tokio::test]
async fn test_question_during_analysis_is_rejected() {
    let env = setup_test_env();
    let embedding: Arc<MockEmbedding> = Arc::new(MockEmbedding::new());
    let analyze = env.analyzer(
        Arc::new(SlowFetcher {
            delay: Duration::from_millis(500),
            files: sample_tree(),
        }),
        embedding.clone(),
    );

    let submitted = analyze
        .submit("https://example.com/acme/slow.git")
        .await
        .expect("submit");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let ask = env.asker(embedding);
    let result = ask.execute(submitted.id(), "What does foo return?", &[]).await;

    assert!(matches!(result, Err(ref e) if e.is_not_ready()));
    assert_eq!(env.chat_model.calls(), 0);
}

#[tokio::test]
async fn test_cancel_stops_analysis() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(SlowFetcher {
            delay: Duration::from_millis(500),
            files: sample_tree(),
        }),
        Arc::new(MockEmbedding::new()),
    );

    let submitted = analyze
        .submit("https://example.com/acme/slow.git")
        .await
        .expect("submit");
    tokio::time::sleep(Duration::from_millis(50)).await;

    analyze.cancel(submitted.id()).await.expect("cancel");

    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Failed);
    assert_eq!(repository.status_message(), "Analysis cancelled");
    assert_eq!(env.vector_repo.count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_submit_while_running_is_rejected() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(SlowFetcher {
            delay: Duration::from_millis(500),
            files: sample_tree(),
        }),
        Arc::new(MockEmbedding::new()),
    );

    let submitted = analyze
        .submit("https://example.com/acme/slow.git")
        .await
        .expect("submit");

    let duplicate = analyze.submit("https://example.com/acme/slow.git").await;
    assert!(matches!(duplicate, Err(DomainError::AlreadyExists(_))));

    // The original run is unaffected.
    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);
}

#[tokio::test]
async fn test_resubmit_after_completion_requeues() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(MockEmbedding::new()),
    );

    let first = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("first submit");
    let completed = env.wait_for_terminal(first.id()).await;
    assert_eq!(completed.status(), AnalysisStatus::Completed);

    let second = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("second submit");
    assert_eq!(second.id(), first.id(), "re-analysis keeps the repository id");

    let repository = env.wait_for_terminal(second.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);
    assert_eq!(repository.file_count(), 2);

    let stored = env
        .vector_repo
        .count_by_repository(repository.id())
        .await
        .expect("count");
    assert_eq!(stored as u64, repository.chunk_count());
}

#[tokio::test]
async fn test_delete_removes_all_artifacts() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(MockEmbedding::new()),
    );

    let submitted = analyze
        .submit("https://example.com/acme/sample.git")
        .await
        .expect("submit");
    let repository = env.wait_for_terminal(submitted.id()).await;
    assert_eq!(repository.status(), AnalysisStatus::Completed);

    let checkout = analyze.checkout_dir(repository.id());
    assert!(checkout.exists());

    let delete = DeleteRepositoryUseCase::new(
        env.metadata_repo.clone(),
        env.file_repo.clone(),
        env.graph_repo.clone(),
        env.vector_repo.clone(),
        env.progress.clone(),
        analyze.clone(),
    );
    delete.execute(repository.id()).await.expect("delete");

    assert!(env
        .metadata_repo
        .find_by_id(repository.id())
        .await
        .expect("find_by_id")
        .is_none());
    assert_eq!(
        env.vector_repo
            .count_by_repository(repository.id())
            .await
            .expect("count"),
        0
    );
    let graph = env.graph_repo.load(repository.id()).await.expect("load graph");
    assert_eq!(graph.node_count(), 0);
    let files = env
        .file_repo
        .list_by_repository(repository.id())
        .await
        .expect("list files");
    assert!(files.is_empty());
    assert!(!checkout.exists());

    let missing = delete.execute(repository.id()).await;
    assert!(matches!(missing, Err(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_invalid_url_is_rejected_without_a_record() {
    let env = setup_test_env();
    let analyze = env.analyzer(
        Arc::new(TreeFetcher { files: sample_tree() }),
        Arc::new(MockEmbedding::new()),
    );

    let result = analyze.submit("ftp://example.com/acme/sample").await;
    assert!(matches!(result, Err(DomainError::InvalidInput(_))));

    let repositories = env.metadata_repo.list_all().await.expect("list");
    assert!(repositories.is_empty());
}
