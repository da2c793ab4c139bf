use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::language::Language;

/// A source file retained after repository scanning. Keyed by
/// `(repository_id, path)`; paths are relative to the repository root with
/// `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    repository_id: String,
    path: String,
    language: Language,
    size_bytes: u64,
    line_count: u64,
    content_hash: String,
}

impl FileRecord {
    pub fn new(repository_id: String, path: String, content: &str) -> Self {
        let language = Language::from_path(Path::new(&path));
        Self {
            repository_id,
            language,
            size_bytes: content.len() as u64,
            line_count: content.lines().count() as u64,
            content_hash: compute_content_hash(content),
            path,
        }
    }

    pub fn reconstitute(
        repository_id: String,
        path: String,
        language: Language,
        size_bytes: u64,
        line_count: u64,
        content_hash: String,
    ) -> Self {
        Self {
            repository_id,
            path,
            language,
            size_bytes,
            line_count,
            content_hash,
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Directory part of the path, empty for root-level files.
    pub fn parent_dir(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

/// SHA-256 of the file content, hex-encoded. Used to detect unchanged files
/// across runs.
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_record() {
        let record = FileRecord::new(
            "repo-1".to_string(),
            "src/main.py".to_string(),
            "def main():\n    pass\n",
        );

        assert_eq!(record.language(), Language::Python);
        assert_eq!(record.line_count(), 2);
        assert_eq!(record.size_bytes(), 21);
        assert_eq!(record.parent_dir(), "src");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = compute_content_hash("hello");
        let b = compute_content_hash("hello");
        let c = compute_content_hash("world");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_parent_dir_for_root_file() {
        let record = FileRecord::new("repo-1".to_string(), "README.md".to_string(), "# hi\n");
        assert_eq!(record.parent_dir(), "");
    }
}
