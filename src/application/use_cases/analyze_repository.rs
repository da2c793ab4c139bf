use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use ignore::WalkBuilder;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::interfaces::{
    EmbeddingService, FileRepository, GraphRepository, MetadataRepository, ParserService,
    SourceFetcher, VectorRepository,
};
use crate::application::progress::ProgressHub;
use crate::domain::models::{
    AnalysisStatus, CodeChunk, Embedding, FileRecord, Language, LanguageStats, ParseOutcome,
    Repository, StatusUpdate, SymbolRecord, SymbolReference,
};
use crate::domain::services::{build_graph, Chunker, ChunkerConfig};
use crate::domain::DomainError;

const ACCEPTED_SCHEMES: [&str; 4] = ["https://", "http://", "git://", "file://"];

/// Tuning knobs for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Root directory for repository checkouts.
    pub data_dir: PathBuf,
    pub clone_timeout: Duration,
    pub max_repo_size_bytes: u64,
    pub max_file_size_bytes: u64,
    /// Concurrent file parses within one analysis.
    pub parse_workers: usize,
    /// Analyses running at once; further submissions queue as pending.
    pub max_concurrent_analyses: usize,
    pub embed_batch_size: usize,
    /// Per-batch embedding call timeout.
    pub embed_timeout: Duration,
    /// Retries per batch after the first attempt.
    pub embed_retries: u32,
    /// Backoff doubles from this base between attempts.
    pub embed_backoff_base: Duration,
    pub chunker: ChunkerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.codeatlas"),
            clone_timeout: Duration::from_secs(300),
            max_repo_size_bytes: 500 * 1024 * 1024,
            max_file_size_bytes: 1024 * 1024,
            parse_workers: 4,
            max_concurrent_analyses: 2,
            embed_batch_size: 10,
            embed_timeout: Duration::from_secs(30),
            embed_retries: 3,
            embed_backoff_base: Duration::from_millis(500),
            chunker: ChunkerConfig::default(),
        }
    }
}

/// Runs the full analysis pipeline for a repository: clone, scan, parse,
/// graph build, chunk, embed, index. Stages execute in a background task;
/// progress flows to the metadata store and the progress hub.
///
/// Index writes happen once at the end of a successful run, so queries never
/// observe a partial mix of two runs and failed runs leave the previous
/// index untouched.
pub struct AnalyzeRepositoryUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    graph_repo: Arc<dyn GraphRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    source_fetcher: Arc<dyn SourceFetcher>,
    parser_service: Arc<dyn ParserService>,
    embedding_service: Arc<dyn EmbeddingService>,
    progress: Arc<ProgressHub>,
    config: AnalysisConfig,
    semaphore: Arc<Semaphore>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

impl AnalyzeRepositoryUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        file_repo: Arc<dyn FileRepository>,
        graph_repo: Arc<dyn GraphRepository>,
        vector_repo: Arc<dyn VectorRepository>,
        source_fetcher: Arc<dyn SourceFetcher>,
        parser_service: Arc<dyn ParserService>,
        embedding_service: Arc<dyn EmbeddingService>,
        progress: Arc<ProgressHub>,
        config: AnalysisConfig,
    ) -> Self {
        let permits = config.max_concurrent_analyses.max(1);
        Self {
            metadata_repo,
            file_repo,
            graph_repo,
            vector_repo,
            source_fetcher,
            parser_service,
            embedding_service,
            progress,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a repository for analysis and starts the pipeline in the
    /// background. Returns the pending repository record.
    ///
    /// A URL already being analyzed is rejected; a URL whose previous run
    /// finished is re-queued and fully re-analyzed.
    pub async fn submit(self: &Arc<Self>, origin_url: &str) -> Result<Repository, DomainError> {
        let origin_url = origin_url.trim();
        validate_origin_url(origin_url)?;

        let repository = match self.metadata_repo.find_by_origin(origin_url).await? {
            Some(existing) if !existing.status().is_terminal() => {
                return Err(DomainError::already_exists(format!(
                    "Repository {} is already being analyzed",
                    origin_url
                )));
            }
            Some(mut existing) => {
                info!("Re-queuing repository {} for analysis", existing.id());
                existing.requeue();
                self.metadata_repo.save(&existing).await?;
                existing
            }
            None => {
                let repository = Repository::new(origin_url.to_string());
                self.metadata_repo.save(&repository).await?;
                repository
            }
        };

        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .await
            .insert(repository.id().to_string(), token.clone());

        let this = Arc::clone(self);
        let background = repository.clone();
        tokio::spawn(async move {
            this.run(background, token).await;
        });

        Ok(repository)
    }

    /// Requests cancellation of a running analysis. The pipeline stops at
    /// its next checkpoint; in-flight clone or embedding calls are not
    /// interrupted mid-flight.
    pub async fn cancel(&self, repository_id: &str) -> Result<(), DomainError> {
        if let Some(token) = self.cancellations.lock().await.get(repository_id) {
            token.cancel();
            return Ok(());
        }
        match self.metadata_repo.find_by_id(repository_id).await? {
            Some(repository) => Err(DomainError::invalid_input(format!(
                "Repository {} is not being analyzed (status: {})",
                repository_id,
                repository.status()
            ))),
            None => Err(DomainError::not_found(format!(
                "Repository {} not found",
                repository_id
            ))),
        }
    }

    /// Best-effort cancellation used when a repository is deleted mid-run.
    pub async fn cancel_if_running(&self, repository_id: &str) {
        if let Some(token) = self.cancellations.lock().await.remove(repository_id) {
            token.cancel();
        }
    }

    pub fn checkout_dir(&self, repository_id: &str) -> PathBuf {
        self.config.data_dir.join("checkouts").join(repository_id)
    }

    async fn run(&self, mut repository: Repository, cancel: CancellationToken) {
        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let outcome = self.run_pipeline(&mut repository, &cancel).await;
        drop(permit);

        match outcome {
            Ok(()) => {}
            Err(e) if cancel.is_cancelled() => {
                debug!("Analysis of {} stopped: {}", repository.id(), e);
                self.finish_failed(&mut repository, "Analysis cancelled".to_string())
                    .await;
            }
            Err(e) => {
                warn!("Analysis of {} failed: {}", repository.id(), e);
                self.finish_failed(&mut repository, format!("Analysis failed: {}", e))
                    .await;
            }
        }

        self.cancellations.lock().await.remove(repository.id());
    }

    async fn run_pipeline(
        &self,
        repository: &mut Repository,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let started = Instant::now();
        let workdir = self.checkout_dir(repository.id());

        checkpoint(cancel)?;
        self.transition(repository, AnalysisStatus::Cloning, "Cloning repository...")
            .await?;
        self.clone_source(repository.origin_url(), &workdir).await?;

        checkpoint(cancel)?;
        self.transition(repository, AnalysisStatus::Analyzing, "Scanning files...")
            .await?;
        let files = self.scan_files(repository.id().to_string(), workdir.clone()).await?;
        info!(
            "Repository {}: retained {} source files",
            repository.id(),
            files.len()
        );

        checkpoint(cancel)?;
        self.transition(repository, AnalysisStatus::Analyzing, "Parsing code structure...")
            .await?;
        let (symbols, references) = self.parse_files(&files).await;

        checkpoint(cancel)?;
        let records: Vec<FileRecord> = files.iter().map(|(record, _)| record.clone()).collect();
        let graph = build_graph(&records, &symbols, &references);
        self.transition(
            repository,
            AnalysisStatus::Analyzing,
            format!("Detected {} relationships", graph.edge_count()),
        )
        .await?;

        let chunks = self.chunk_files(&files, &symbols);
        debug!(
            "Repository {}: {} chunks from {} files",
            repository.id(),
            chunks.len(),
            files.len()
        );

        checkpoint(cancel)?;
        self.transition(repository, AnalysisStatus::Indexing, "Generating embeddings...")
            .await?;
        let embeddings = self.embed_chunks(repository, &chunks, cancel).await?;

        checkpoint(cancel)?;
        self.file_repo.replace_all(repository.id(), &records).await?;
        self.graph_repo.replace(repository.id(), &graph).await?;
        self.vector_repo
            .replace_repository(repository.id(), &chunks, &embeddings)
            .await?;

        let languages = language_stats(&records, &chunks);
        self.metadata_repo
            .update_stats(
                repository.id(),
                records.len() as u64,
                chunks.len() as u64,
                &languages,
            )
            .await?;
        repository.update_stats(records.len() as u64, chunks.len() as u64);
        repository.set_languages(languages);

        let model = self.embedding_service.config().model_name().to_string();
        self.metadata_repo
            .record_embedding_model(repository.id(), &model)
            .await?;
        repository.record_embedding_model(model);

        self.transition(repository, AnalysisStatus::Completed, "Analysis complete")
            .await?;
        info!(
            "Repository {} analyzed in {:.2}s ({} files, {} chunks)",
            repository.id(),
            started.elapsed().as_secs_f64(),
            repository.file_count(),
            repository.chunk_count()
        );
        Ok(())
    }

    async fn clone_source(&self, origin_url: &str, workdir: &Path) -> Result<(), DomainError> {
        if let Err(e) = tokio::fs::remove_dir_all(workdir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(DomainError::fetch(format!(
                    "Failed to clear checkout directory: {}",
                    e
                )));
            }
        }
        if let Some(parent) = workdir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match timeout(
            self.config.clone_timeout,
            self.source_fetcher.fetch(origin_url, workdir),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::fetch(format!(
                "Clone timed out after {}s",
                self.config.clone_timeout.as_secs()
            ))),
        }
    }

    /// Walks the checkout, honoring gitignore rules, and reads every
    /// supported source file. Oversized and non-UTF-8 files are skipped;
    /// results are sorted by path.
    async fn scan_files(
        &self,
        repository_id: String,
        workdir: PathBuf,
    ) -> Result<Vec<(FileRecord, String)>, DomainError> {
        let max_file_size = self.config.max_file_size_bytes;
        let max_repo_size = self.config.max_repo_size_bytes;
        let supported = self.parser_service.supported_languages();

        tokio::task::spawn_blocking(move || {
            scan_blocking(
                &repository_id,
                &workdir,
                max_file_size,
                max_repo_size,
                &supported,
            )
        })
        .await
        .map_err(|e| DomainError::internal(format!("Scan task failed: {}", e)))?
    }

    /// Parses every file with bounded concurrency. Parser failures degrade
    /// to an empty outcome per file; output order follows the sorted file
    /// list, not completion order.
    async fn parse_files(
        &self,
        files: &[(FileRecord, String)],
    ) -> (Vec<SymbolRecord>, Vec<SymbolReference>) {
        let outcomes: HashMap<String, ParseOutcome> = stream::iter(files.iter())
            .map(|(record, content)| {
                let parser = Arc::clone(&self.parser_service);
                async move {
                    let outcome = match parser.parse_file(record, content).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!("Failed to parse {}: {}", record.path(), e);
                            ParseOutcome::empty()
                        }
                    };
                    (record.path().to_string(), outcome)
                }
            })
            .buffer_unordered(self.config.parse_workers.max(1))
            .collect()
            .await;

        let mut symbols = Vec::new();
        let mut references = Vec::new();
        for (record, _) in files {
            if let Some(outcome) = outcomes.get(record.path()) {
                symbols.extend(outcome.symbols.iter().cloned());
                references.extend(outcome.references.iter().cloned());
            }
        }
        (symbols, references)
    }

    fn chunk_files(
        &self,
        files: &[(FileRecord, String)],
        symbols: &[SymbolRecord],
    ) -> Vec<CodeChunk> {
        let chunker = Chunker::new(self.config.chunker.clone());
        let mut symbols_by_file: HashMap<&str, Vec<SymbolRecord>> = HashMap::new();
        for symbol in symbols {
            symbols_by_file
                .entry(symbol.file_path())
                .or_default()
                .push(symbol.clone());
        }

        let mut chunks = Vec::new();
        for (record, content) in files {
            let file_symbols = symbols_by_file
                .get(record.path())
                .map(|s| s.as_slice())
                .unwrap_or(&[]);
            chunks.extend(chunker.chunk_file(record, content, file_symbols));
        }
        chunks
    }

    /// Embeds chunks in bounded batches. Each batch gets a call timeout and
    /// retries with doubling backoff; batches are only appended after
    /// success, so a retried batch lands in the index exactly once.
    async fn embed_chunks(
        &self,
        repository: &Repository,
        chunks: &[CodeChunk],
        cancel: &CancellationToken,
    ) -> Result<Vec<Embedding>, DomainError> {
        let total_batches = chunks.len().div_ceil(self.config.embed_batch_size.max(1));
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(self.config.embed_batch_size.max(1)).enumerate() {
            checkpoint(cancel)?;
            let batch_embeddings = self.embed_batch_with_retry(batch).await?;
            embeddings.extend(batch_embeddings);

            self.progress
                .publish(StatusUpdate::new(
                    repository.id(),
                    AnalysisStatus::Indexing,
                    format!("Generating embeddings... ({}/{})", batch_index + 1, total_batches),
                ))
                .await;
        }
        Ok(embeddings)
    }

    async fn embed_batch_with_retry(
        &self,
        batch: &[CodeChunk],
    ) -> Result<Vec<Embedding>, DomainError> {
        let mut attempt: u32 = 0;
        loop {
            let result = timeout(
                self.config.embed_timeout,
                self.embedding_service.embed_chunks(batch),
            )
            .await;

            let error = match result {
                Ok(Ok(embeddings)) => return Ok(embeddings),
                Ok(Err(e)) => e,
                Err(_) => DomainError::embedding(format!(
                    "Embedding call timed out after {}s",
                    self.config.embed_timeout.as_secs()
                )),
            };

            if attempt >= self.config.embed_retries {
                return Err(error);
            }
            let backoff = self.config.embed_backoff_base * 2u32.pow(attempt);
            warn!(
                "Embedding batch failed (attempt {}): {}; retrying in {:?}",
                attempt + 1,
                error,
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn transition(
        &self,
        repository: &mut Repository,
        status: AnalysisStatus,
        message: impl Into<String>,
    ) -> Result<(), DomainError> {
        let message = message.into();
        repository.set_status(status, message.clone());
        self.metadata_repo
            .update_status(repository.id(), status, &message)
            .await?;
        self.progress
            .publish(StatusUpdate::new(repository.id(), status, message))
            .await;
        Ok(())
    }

    /// Records a failed run and removes the partial checkout. The previous
    /// index, if any, stays as it was.
    async fn finish_failed(&self, repository: &mut Repository, message: String) {
        repository.set_status(AnalysisStatus::Failed, message.clone());
        if let Err(e) = self
            .metadata_repo
            .update_status(repository.id(), AnalysisStatus::Failed, &message)
            .await
        {
            warn!("Failed to record failure for {}: {}", repository.id(), e);
        }
        self.progress
            .publish(StatusUpdate::new(
                repository.id(),
                AnalysisStatus::Failed,
                message,
            ))
            .await;

        let workdir = self.checkout_dir(repository.id());
        if let Err(e) = tokio::fs::remove_dir_all(&workdir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove checkout {}: {}", workdir.display(), e);
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), DomainError> {
    if cancel.is_cancelled() {
        return Err(DomainError::internal("Analysis cancelled"));
    }
    Ok(())
}

fn validate_origin_url(origin_url: &str) -> Result<(), DomainError> {
    if origin_url.is_empty() {
        return Err(DomainError::invalid_input("Repository URL must not be empty"));
    }
    if !ACCEPTED_SCHEMES
        .iter()
        .any(|scheme| origin_url.starts_with(scheme))
    {
        return Err(DomainError::invalid_input(format!(
            "Unsupported repository URL scheme: {}",
            origin_url
        )));
    }
    Ok(())
}

fn scan_blocking(
    repository_id: &str,
    workdir: &Path,
    max_file_size: u64,
    max_repo_size: u64,
    supported: &[Language],
) -> Result<Vec<(FileRecord, String)>, DomainError> {
    let mut files = Vec::new();
    let mut total_size: u64 = 0;

    let walker = WalkBuilder::new(workdir)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking checkout: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        total_size += size;
        if total_size > max_repo_size {
            return Err(DomainError::fetch(format!(
                "Repository exceeds the maximum size of {} bytes",
                max_repo_size
            )));
        }

        let language = Language::from_path(path);
        if language == Language::Unknown || !supported.contains(&language) {
            continue;
        }
        if size > max_file_size {
            debug!("Skipping oversized file: {}", path.display());
            continue;
        }

        let relative_path = path
            .strip_prefix(workdir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping unreadable file {}: {}", relative_path, e);
                continue;
            }
        };

        files.push((
            FileRecord::new(repository_id.to_string(), relative_path, &content),
            content,
        ));
    }

    files.sort_by(|a, b| a.0.path().cmp(b.0.path()));
    Ok(files)
}

fn language_stats(
    records: &[FileRecord],
    chunks: &[CodeChunk],
) -> HashMap<String, LanguageStats> {
    let mut stats: HashMap<String, LanguageStats> = HashMap::new();
    for record in records {
        stats
            .entry(record.language().as_str().to_string())
            .or_default()
            .file_count += 1;
    }
    for chunk in chunks {
        stats
            .entry(chunk.language().as_str().to_string())
            .or_default()
            .chunk_count += 1;
    }
    stats
}
