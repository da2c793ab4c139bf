use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::application::interfaces::{
    ChatModel, FileRepository, GraphRepository, MetadataRepository,
};
use crate::application::use_cases::browse_repository::read_checkout_file;
use crate::domain::models::{ChatTurn, GraphNodeType, Language, SymbolKind};
use crate::domain::DomainError;

/// Characters of file content handed to the model.
const EXPLAIN_CONTENT_HEAD: usize = 4000;

/// Symbol count at which a file saturates the complexity scale.
const COMPLEXITY_SATURATION: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLabel {
    Low,
    Medium,
    High,
}

impl ComplexityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLabel::Low => "low",
            ComplexityLabel::Medium => "medium",
            ComplexityLabel::High => "high",
        }
    }

    /// Buckets a 0..=1 density score.
    fn from_score(score: f32) -> Self {
        if score < 0.3 {
            ComplexityLabel::Low
        } else if score < 0.7 {
            ComplexityLabel::Medium
        } else {
            ComplexityLabel::High
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeySymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileExplanation {
    pub path: String,
    pub language: Language,
    pub line_count: u64,
    pub complexity: ComplexityLabel,
    pub key_symbols: Vec<KeySymbol>,
    pub summary: String,
}

/// Produces a model-written summary of one file along with its key symbols
/// and a complexity label derived from symbol density.
pub struct ExplainFileUseCase {
    metadata_repo: Arc<dyn MetadataRepository>,
    file_repo: Arc<dyn FileRepository>,
    graph_repo: Arc<dyn GraphRepository>,
    chat_model: Arc<dyn ChatModel>,
    checkouts_dir: PathBuf,
}

impl ExplainFileUseCase {
    pub fn new(
        metadata_repo: Arc<dyn MetadataRepository>,
        file_repo: Arc<dyn FileRepository>,
        graph_repo: Arc<dyn GraphRepository>,
        chat_model: Arc<dyn ChatModel>,
        checkouts_dir: PathBuf,
    ) -> Self {
        Self {
            metadata_repo,
            file_repo,
            graph_repo,
            chat_model,
            checkouts_dir,
        }
    }

    pub async fn execute(
        &self,
        repository_id: &str,
        path: &str,
    ) -> Result<FileExplanation, DomainError> {
        let repository = self
            .metadata_repo
            .find_by_id(repository_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Repository {} not found", repository_id))
            })?;
        if !repository.is_queryable() {
            return Err(DomainError::not_ready(format!(
                "Repository {} is not ready (status: {})",
                repository_id,
                repository.status()
            )));
        }

        let record = self
            .file_repo
            .find_by_path(repository_id, path)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("File {} not found in repository", path))
            })?;

        let graph = self.graph_repo.load(repository_id).await?;
        let mut key_symbols: Vec<KeySymbol> = graph
            .nodes
            .iter()
            .filter(|node| node.node_type == GraphNodeType::Symbol && node.file_path == path)
            .map(|node| KeySymbol {
                name: node.label.clone(),
                kind: node.symbol_kind.unwrap_or(SymbolKind::Other),
                start_line: node.start_line.unwrap_or(0),
            })
            .collect();
        key_symbols.sort_by_key(|s| s.start_line);

        let score = (key_symbols.len() as f32 / COMPLEXITY_SATURATION).min(1.0);
        let complexity = ComplexityLabel::from_score(score);
        debug!(
            "File {} has {} symbols (complexity {})",
            path,
            key_symbols.len(),
            complexity.as_str()
        );

        let root = self.checkouts_dir.join(repository_id);
        let content = read_checkout_file(&root, path).await?;
        let head: String = content.chars().take(EXPLAIN_CONTENT_HEAD).collect();

        let system = "You are a code assistant. Summarize the purpose and structure of the \
                      given source file in two to three sentences. Mention the most important \
                      definitions by name."
            .to_string();
        let prompt = format!("File: {} ({})\n```\n{}\n```", path, record.language(), head);
        let summary = self
            .chat_model
            .complete(&system, &[ChatTurn::user(prompt)])
            .await?;

        Ok(FileExplanation {
            path: record.path().to_string(),
            language: record.language(),
            line_count: record.line_count(),
            complexity,
            key_symbols,
            summary,
        })
    }
}
