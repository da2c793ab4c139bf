use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::language::Language;

/// A contiguous slice of a source file prepared for embedding. Chunk ids are
/// deterministic over `(repository, path, seq, span)` so re-chunking
/// unchanged content yields identical ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    id: String,
    repository_id: String,
    file_path: String,
    /// Position of this chunk within its file, starting at 0.
    seq: u32,
    content: String,
    start_line: u32,
    end_line: u32,
    language: Language,
    symbol_id: Option<String>,
    symbol_name: Option<String>,
}

impl CodeChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: String,
        file_path: String,
        seq: u32,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
    ) -> Self {
        let id = chunk_id(&repository_id, &file_path, seq, start_line, end_line);
        Self {
            id,
            repository_id,
            file_path,
            seq,
            content,
            start_line,
            end_line,
            language,
            symbol_id: None,
            symbol_name: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repository_id: String,
        file_path: String,
        seq: u32,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        symbol_id: Option<String>,
        symbol_name: Option<String>,
    ) -> Self {
        Self {
            id,
            repository_id,
            file_path,
            seq,
            content,
            start_line,
            end_line,
            language,
            symbol_id,
            symbol_name,
        }
    }

    pub fn with_symbol(mut self, symbol_id: impl Into<String>, symbol_name: impl Into<String>) -> Self {
        self.symbol_id = Some(symbol_id.into());
        self.symbol_name = Some(symbol_name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn symbol_id(&self) -> Option<&str> {
        self.symbol_id.as_deref()
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref()
    }

    /// Human-readable source location, e.g. `src/app.py:10-24`.
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    /// Rough token estimate used for context budgeting.
    pub fn estimated_tokens(&self) -> usize {
        self.content.len() / 4
    }
}

fn chunk_id(repository_id: &str, file_path: &str, seq: u32, start_line: u32, end_line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    hasher.update(b"|");
    hasher.update(file_path.as_bytes());
    hasher.update(b"|");
    hasher.update(seq.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(start_line.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(end_line.to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
