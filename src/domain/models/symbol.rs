use serde::{Deserialize, Serialize};

use super::reference::SymbolReference;

/// Kind of a top-level symbol extracted by the structural parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Module,
    Other,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Module => "module",
            SymbolKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "function" | "method" => SymbolKind::Function,
            "class" | "struct" | "interface" | "enum" | "trait" => SymbolKind::Class,
            "module" => SymbolKind::Module,
            _ => SymbolKind::Other,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named declaration found in a source file. Line numbers are 1-based and
/// inclusive. The id is deterministic so repeated parses of the same content
/// produce the same symbol identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    id: String,
    repository_id: String,
    file_path: String,
    name: String,
    kind: SymbolKind,
    start_line: u32,
    end_line: u32,
}

impl SymbolRecord {
    pub fn new(
        repository_id: String,
        file_path: String,
        name: String,
        kind: SymbolKind,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let id = symbol_id(&file_path, &name, start_line);
        Self {
            id,
            repository_id,
            file_path,
            name,
            kind,
            start_line,
            end_line,
        }
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

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Whether `line` (1-based) falls within this symbol's span.
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    pub fn line_span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Deterministic symbol identity: `{path}#{name}@{start_line}`.
pub fn symbol_id(file_path: &str, name: &str, start_line: u32) -> String {
    format!("{}#{}@{}", file_path, name, start_line)
}

/// Result of parsing one source file: its top-level symbols plus any
/// import/inheritance references found alongside them.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub symbols: Vec<SymbolRecord>,
    pub references: Vec<SymbolReference>,
}

impl ParseOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_is_deterministic() {
        let a = SymbolRecord::new(
            "repo-1".to_string(),
            "src/app.py".to_string(),
            "handler".to_string(),
            SymbolKind::Function,
            10,
            24,
        );
        let b = SymbolRecord::new(
            "repo-1".to_string(),
            "src/app.py".to_string(),
            "handler".to_string(),
            SymbolKind::Function,
            10,
            24,
        );

        assert_eq!(a.id(), b.id());
        assert_eq!(a.id(), "src/app.py#handler@10");
    }

    #[test]
    fn test_contains_line() {
        let symbol = SymbolRecord::new(
            "repo-1".to_string(),
            "lib.rs".to_string(),
            "run".to_string(),
            SymbolKind::Function,
            5,
            9,
        );

        assert!(symbol.contains_line(5));
        assert!(symbol.contains_line(7));
        assert!(symbol.contains_line(9));
        assert!(!symbol.contains_line(4));
        assert!(!symbol.contains_line(10));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(SymbolKind::parse("class"), SymbolKind::Class);
        assert_eq!(SymbolKind::parse("struct"), SymbolKind::Class);
        assert_eq!(SymbolKind::parse("FUNCTION"), SymbolKind::Function);
        assert_eq!(SymbolKind::parse("whatever"), SymbolKind::Other);
    }
}
