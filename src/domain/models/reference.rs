use serde::{Deserialize, Serialize};

/// Kind of cross-file relationship recorded during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `import x` / `from x import y` / `import "./x"`.
    Imports,
    /// `class A(B)` / `class A extends B`.
    Extends,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Imports => "imports",
            ReferenceKind::Extends => "extends",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "imports" => Some(ReferenceKind::Imports),
            "extends" => Some(ReferenceKind::Extends),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unresolved reference extracted from a source file. `target` is the raw
/// text as written (a module path for imports, a base-class name for
/// extends); resolution against the file set happens at graph build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReference {
    repository_id: String,
    file_path: String,
    kind: ReferenceKind,
    target: String,
    /// For `Extends`, the subclass symbol's name; unused for imports.
    symbol_name: Option<String>,
    line: u32,
}

impl SymbolReference {
    pub fn imports(repository_id: String, file_path: String, target: String, line: u32) -> Self {
        Self {
            repository_id,
            file_path,
            kind: ReferenceKind::Imports,
            target,
            symbol_name: None,
            line,
        }
    }

    pub fn extends(
        repository_id: String,
        file_path: String,
        symbol_name: String,
        target: String,
        line: u32,
    ) -> Self {
        Self {
            repository_id,
            file_path,
            kind: ReferenceKind::Extends,
            target,
            symbol_name: Some(symbol_name),
            line,
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref()
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_reference() {
        let reference = SymbolReference::imports(
            "repo-1".to_string(),
            "b.py".to_string(),
            "a".to_string(),
            1,
        );

        assert_eq!(reference.kind(), ReferenceKind::Imports);
        assert_eq!(reference.target(), "a");
        assert!(reference.symbol_name().is_none());
    }

    #[test]
    fn test_extends_reference_carries_subclass() {
        let reference = SymbolReference::extends(
            "repo-1".to_string(),
            "models.py".to_string(),
            "Admin".to_string(),
            "User".to_string(),
            12,
        );

        assert_eq!(reference.kind(), ReferenceKind::Extends);
        assert_eq!(reference.symbol_name(), Some("Admin"));
        assert_eq!(reference.target(), "User");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ReferenceKind::parse("imports"), Some(ReferenceKind::Imports));
        assert_eq!(ReferenceKind::parse("EXTENDS"), Some(ReferenceKind::Extends));
        assert_eq!(ReferenceKind::parse("calls"), None);
    }
}
