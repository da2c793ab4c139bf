use serde::{Deserialize, Serialize};

use super::chunk::CodeChunk;
use super::language::Language;

/// A similarity search request against the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    query: String,
    limit: usize,
    min_score: Option<f32>,
    languages: Vec<Language>,
    repository_ids: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            min_score: None,
            languages: Vec::new(),
            repository_ids: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_repository(mut self, repository_id: impl Into<String>) -> Self {
        self.repository_ids.push(repository_id.into());
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn min_score(&self) -> Option<f32> {
        self.min_score
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn repository_ids(&self) -> &[String] {
        &self.repository_ids
    }

    /// Whether a result with this score and language passes the filters.
    pub fn accepts(&self, score: f32, language: Language) -> bool {
        if let Some(min) = self.min_score {
            if score < min {
                return false;
            }
        }
        self.languages.is_empty() || self.languages.contains(&language)
    }
}

/// A scored chunk returned from the vector index. Scores are cosine
/// similarity in `[-1, 1]`, higher is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: CodeChunk,
    pub score: f32,
}

impl SearchResult {
    pub fn new(chunk: CodeChunk, score: f32) -> Self {
        Self { chunk, score }
    }
}
