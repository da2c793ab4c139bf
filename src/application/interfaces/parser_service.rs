use async_trait::async_trait;

use crate::domain::models::{FileRecord, Language, ParseOutcome};
use crate::domain::DomainError;

/// Port for structural parsing of source files.
#[async_trait]
pub trait ParserService: Send + Sync {
    /// Extracts symbols and references from one file. Implementations treat
    /// malformed sources as recoverable: a file that cannot be parsed yields
    /// an empty outcome, not an error that would abort the run.
    async fn parse_file(&self, file: &FileRecord, content: &str)
        -> Result<ParseOutcome, DomainError>;

    /// Languages this parser has grammars for.
    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}
