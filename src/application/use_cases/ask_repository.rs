use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::interfaces::{
    ChatModel, EmbeddingService, MetadataRepository, VectorRepository,
};
use crate::domain::models::{
    Answer, ChatTurn, Repository, SearchQuery, SearchResult, SourceRef,
};
use crate::domain::DomainError;

const NO_CONTEXT_ANSWER: &str = "I could not find code relevant to that question in this \
repository. Try rephrasing, or ask about a specific file, function, or class.";

/// Retrieval and generation parameters for repository Q&A.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Rough token budget for retrieved context.
    pub max_context_tokens: usize,
    /// Conversation turns kept from client-supplied history.
    pub max_history_turns: usize,
    pub max_query_chars: usize,
    /// Per-snippet cap inside the prompt.
    pub max_snippet_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            max_context_tokens: 3000,
            max_history_turns: 10,
            max_query_chars: 4000,
            max_snippet_chars: 2000,
        }
    }
}

/// Answers questions about an analyzed repository: embeds the question,
/// retrieves the nearest chunks scoped to that repository, and asks the chat
/// model with the retrieved code as context.
///
/// Questions against repositories that are not fully analyzed fail fast
/// before any embedding or model call.
pub struct AskRepositoryUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    chat_model: Arc<dyn ChatModel>,
    config: RagConfig,
}

impl AskRepositoryUseCase {
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        vector_repo: Arc<dyn VectorRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
        chat_model: Arc<dyn ChatModel>,
        config: RagConfig,
    ) -> Self {
        Self {
            metadata_repo,
            vector_repo,
            embedding_service,
            chat_model,
            config,
        }
    }

    pub async fn execute(
        &self,
        repository_id: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<Answer, DomainError> {
        let repository = self
            .metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })?;

        if !repository.is_queryable() {
            return Err(DomainError::not_ready(format!(
                "Repository {} is not ready for questions (status: {})",
                repository_id,
                repository.status()
            )));
        }
        self.check_model_identity(&repository)?;

        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::invalid_input("Question must not be empty"));
        }
        let question: String = question.chars().take(self.config.max_query_chars).collect();

        let query_vector = self.embedding_service.embed_query(&question).await?;
        let search = SearchQuery::new(question.clone())
            .with_limit(self.config.top_k)
            .with_repository(repository_id);
        let results = self.vector_repo.search(&query_vector, &search).await?;

        if results.is_empty() {
            info!("No context found for question on repository {}", repository_id);
            return Ok(Answer::without_sources(NO_CONTEXT_ANSWER));
        }

        let results = dedupe_by_symbol(results);
        let results = apply_token_budget(results, self.config.max_context_tokens);
        debug!(
            "Answering with {} context chunks for repository {}",
            results.len(),
            repository_id
        );

        let system = self.build_system_prompt(&repository, &results);
        let mut turns = sanitize_history(history, self.config.max_history_turns);
        turns.push(ChatTurn::user(question));

        let answer = self.chat_model.complete(&system, &turns).await?;
        Ok(Answer::new(answer, collect_sources(&results)))
    }

    /// The index is only meaningful to a query embedded with the same model
    /// it was built with.
    fn check_model_identity(&self, repository: &Repository) -> Result<(), DomainError> {
        let current = self.embedding_service.config().model_name();
        match repository.embedding_model() {
            Some(recorded) if recorded == current => Ok(()),
            Some(recorded) => Err(DomainError::invalid_input(format!(
                "Repository was indexed with embedding model '{}' but the active model is '{}'; re-analyze the repository",
                recorded, current
            ))),
            None => Err(DomainError::invalid_input(
                "Repository has no recorded embedding model; re-analyze the repository",
            )),
        }
    }

    fn build_system_prompt(&self, repository: &Repository, results: &[SearchResult]) -> String {
        let context = build_context(results, self.config.max_snippet_chars);
        format!(
            "You are a code assistant answering questions about the repository '{}'.\n\
             Ground every statement in the code excerpts below and cite files by path.\n\
             If the excerpts do not contain the answer, say so instead of guessing.\n\n\
             {}",
            repository.name(),
            context
        )
    }
}

/// Keeps the best-scoring result per symbol. Results arrive best first, so
/// the first occurrence of a symbol wins; chunks without a symbol pass
/// through untouched.
fn dedupe_by_symbol(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::new();
    results
        .into_iter()
        .filter(|result| match result.chunk.symbol_id() {
            Some(symbol_id) => seen.insert(symbol_id.to_string()),
            None => true,
        })
        .collect()
}

/// Drops lowest-ranked results until the estimated context fits the budget.
/// The best result is always kept.
fn apply_token_budget(results: Vec<SearchResult>, max_tokens: usize) -> Vec<SearchResult> {
    let mut kept = Vec::new();
    let mut used = 0usize;
    for result in results {
        let cost = result.chunk.estimated_tokens().max(1);
        if !kept.is_empty() && used + cost > max_tokens {
            break;
        }
        used += cost;
        kept.push(result);
    }
    kept
}

fn build_context(results: &[SearchResult], max_snippet_chars: usize) -> String {
    let blocks: Vec<String> = results
        .iter()
        .map(|result| {
            let chunk = &result.chunk;
            let snippet: String = chunk.content().chars().take(max_snippet_chars).collect();
            format!(
                "File: {} (lines {}-{})\n```\n{}\n```",
                chunk.file_path(),
                chunk.start_line(),
                chunk.end_line(),
                snippet
            )
        })
        .collect();
    blocks.join("\n\n")
}

/// Keeps the most recent turns and drops blank ones. History is supplied by
/// the client per request; the server stores none of it.
fn sanitize_history(history: &[ChatTurn], max_turns: usize) -> Vec<ChatTurn> {
    let filtered: Vec<ChatTurn> = history
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .cloned()
        .collect();
    let start = filtered.len().saturating_sub(max_turns);
    filtered[start..].to_vec()
}

/// Distinct source citations in rank order.
fn collect_sources(results: &[SearchResult]) -> Vec<SourceRef> {
    let mut seen: HashSet<(String, u32, u32)> = HashSet::new();
    let mut sources = Vec::new();
    for result in results {
        let chunk = &result.chunk;
        let key = (
            chunk.file_path().to_string(),
            chunk.start_line(),
            chunk.end_line(),
        );
        if seen.insert(key) {
            sources.push(SourceRef {
                file_path: chunk.file_path().to_string(),
                start_line: chunk.start_line(),
                end_line: chunk.end_line(),
                symbol_name: chunk.symbol_name().map(String::from),
                score: result.score,
            });
        }
    }
    sources
}
