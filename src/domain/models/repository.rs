use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Lifecycle stage of a repository analysis.
///
/// Transitions move forward only (`Pending → Cloning → Analyzing → Indexing →
/// Completed`); `Failed` is reachable from any non-terminal stage. `Completed`
/// and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Cloning,
    Analyzing,
    Indexing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Cloning => "cloning",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Indexing => "indexing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => AnalysisStatus::Pending,
            "cloning" => AnalysisStatus::Cloning,
            "analyzing" => AnalysisStatus::Analyzing,
            "indexing" => AnalysisStatus::Indexing,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            unknown => {
                warn!("Unknown analysis status '{}', treating as failed", unknown);
                AnalysisStatus::Failed
            }
        }
    }

    /// Position in the pipeline, used to assert forward-only movement.
    pub fn stage_order(&self) -> u8 {
        match self {
            AnalysisStatus::Pending => 0,
            AnalysisStatus::Cloning => 1,
            AnalysisStatus::Analyzing => 2,
            AnalysisStatus::Indexing => 3,
            AnalysisStatus::Completed => 4,
            AnalysisStatus::Failed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, AnalysisStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisStatus::Failed)
    }

    /// Whether moving to `next` respects the forward-only rule.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == AnalysisStatus::Failed {
            return true;
        }
        next.stage_order() > self.stage_order()
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-language file statistics for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub file_count: u64,
    pub chunk_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    name: String,
    owner: Option<String>,
    origin_url: String,
    status: AnalysisStatus,
    status_message: String,
    file_count: u64,
    chunk_count: u64,
    /// Embedding model the current index was built with; `None` until the
    /// first successful indexing run.
    embedding_model: Option<String>,
    languages: HashMap<String, LanguageStats>,
    created_at: i64,
    updated_at: i64,
}

impl Repository {
    /// Creates a new repository queued for analysis. Owner and name are
    /// derived from the origin URL path.
    pub fn new(origin_url: String) -> Self {
        let (owner, name) = parse_origin(&origin_url);
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner,
            origin_url,
            status: AnalysisStatus::Pending,
            status_message: "Queued for analysis".to_string(),
            file_count: 0,
            chunk_count: 0,
            embedding_model: None,
            languages: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        name: String,
        owner: Option<String>,
        origin_url: String,
        status: AnalysisStatus,
        status_message: String,
        file_count: u64,
        chunk_count: u64,
        embedding_model: Option<String>,
        languages: HashMap<String, LanguageStats>,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            name,
            owner,
            origin_url,
            status,
            status_message,
            file_count,
            chunk_count,
            embedding_model,
            languages,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn languages(&self) -> &HashMap<String, LanguageStats> {
        &self.languages
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn set_status(&mut self, status: AnalysisStatus, message: impl Into<String>) {
        self.status = status;
        self.status_message = message.into();
        self.updated_at = current_timestamp();
    }

    /// Resets a terminal repository for re-analysis. Counts and artifacts are
    /// superseded by the new run.
    pub fn requeue(&mut self) {
        self.status = AnalysisStatus::Pending;
        self.status_message = "Queued for re-analysis".to_string();
        self.updated_at = current_timestamp();
    }

    pub fn update_stats(&mut self, file_count: u64, chunk_count: u64) {
        self.file_count = file_count;
        self.chunk_count = chunk_count;
        self.updated_at = current_timestamp();
    }

    pub fn set_languages(&mut self, languages: HashMap<String, LanguageStats>) {
        self.languages = languages;
        self.updated_at = current_timestamp();
    }

    pub fn record_embedding_model(&mut self, model: impl Into<String>) {
        self.embedding_model = Some(model.into());
        self.updated_at = current_timestamp();
    }

    /// A repository is queryable only once its graph and index are complete.
    pub fn is_queryable(&self) -> bool {
        self.status.is_complete()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}] ({} files, {} chunks)",
            self.name, self.status, self.file_count, self.chunk_count
        )
    }
}

/// Derives `(owner, name)` from an origin URL path: the last segment is the
/// name (without a `.git` suffix), the one before it the owner.
pub fn parse_origin(url: &str) -> (Option<String>, String) {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let path = without_scheme.split_once('/').map(|(_, p)| p).unwrap_or("");
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let name = segments
        .last()
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty())
        .unwrap_or("repository")
        .to_string();

    let owner = if segments.len() >= 2 {
        Some(segments[segments.len() - 2].to_string())
    } else {
        None
    };

    (owner, name)
}

pub fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_repository_is_pending() {
        let repo = Repository::new("https://example.com/acme/widgets.git".to_string());

        assert_eq!(repo.status(), AnalysisStatus::Pending);
        assert_eq!(repo.name(), "widgets");
        assert_eq!(repo.owner(), Some("acme"));
        assert_eq!(repo.file_count(), 0);
        assert!(!repo.is_queryable());
    }

    #[test]
    fn test_parse_origin_variants() {
        assert_eq!(
            parse_origin("https://example.com/acme/widgets"),
            (Some("acme".to_string()), "widgets".to_string())
        );
        assert_eq!(
            parse_origin("https://example.com/deep/acme/widgets.git"),
            (Some("acme".to_string()), "widgets".to_string())
        );
        assert_eq!(
            parse_origin("https://example.com/widgets"),
            (None, "widgets".to_string())
        );
        assert_eq!(parse_origin("https://example.com/"), (None, "repository".to_string()));
    }

    #[test]
    fn test_status_transitions_forward_only() {
        assert!(AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Cloning));
        assert!(AnalysisStatus::Cloning.can_transition_to(AnalysisStatus::Analyzing));
        assert!(AnalysisStatus::Analyzing.can_transition_to(AnalysisStatus::Indexing));
        assert!(AnalysisStatus::Indexing.can_transition_to(AnalysisStatus::Completed));

        assert!(!AnalysisStatus::Analyzing.can_transition_to(AnalysisStatus::Cloning));
        assert!(!AnalysisStatus::Indexing.can_transition_to(AnalysisStatus::Pending));
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Cloning,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Indexing,
        ] {
            assert!(status.can_transition_to(AnalysisStatus::Failed));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!AnalysisStatus::Completed.can_transition_to(AnalysisStatus::Failed));
        assert!(!AnalysisStatus::Failed.can_transition_to(AnalysisStatus::Pending));
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
    }

    #[test]
    fn test_requeue_resets_terminal_repository() {
        let mut repo = Repository::new("https://example.com/acme/widgets".to_string());
        repo.set_status(AnalysisStatus::Failed, "Analysis failed: boom");

        repo.requeue();

        assert_eq!(repo.status(), AnalysisStatus::Pending);
        assert_eq!(repo.status_message(), "Queued for re-analysis");
    }

    #[test]
    fn test_record_embedding_model() {
        let mut repo = Repository::new("https://example.com/acme/widgets".to_string());
        assert!(repo.embedding_model().is_none());

        repo.record_embedding_model("mock-embedding");

        assert_eq!(repo.embedding_model(), Some("mock-embedding"));
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Cloning,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Indexing,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), status);
        }
    }
}
