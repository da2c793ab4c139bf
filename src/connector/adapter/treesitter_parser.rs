use async_trait::async_trait;
use streaming_iterator::StreamingIterator;
use tracing::{debug, warn};
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::ParserService;
use crate::domain::{
    DomainError, FileRecord, Language, ParseOutcome, SymbolKind, SymbolRecord, SymbolReference,
};

/// Structural parser over tree-sitter grammars. Symbol extraction uses one
/// query per language; import and inheritance references use a second,
/// best-effort query for the languages that have one.
pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: vec![
                Language::Rust,
                Language::Python,
                Language::JavaScript,
                Language::TypeScript,
                Language::Go,
            ],
        }
    }

    fn get_ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }

    fn symbol_query_patterns(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (struct_item name: (type_identifier) @name) @class
                (enum_item name: (type_identifier) @name) @class
                (trait_item name: (type_identifier) @name) @class
                (mod_item name: (identifier) @name) @module
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                "#
            }
            Language::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (variable_declarator name: (identifier) @name value: (arrow_function)) @function
                "#
            }
            Language::TypeScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (interface_declaration name: (type_identifier) @name) @class
                (enum_declaration name: (identifier) @name) @class
                (variable_declarator name: (identifier) @name value: (arrow_function)) @function
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @function
                (type_declaration (type_spec name: (type_identifier) @name)) @class
                "#
            }
            Language::Unknown => "",
        }
    }

    /// Import and inheritance patterns. Only Python and the script languages
    /// carry enough information in their syntax for path-level resolution.
    fn reference_query_patterns(&self, language: Language) -> &'static str {
        match language {
            Language::Python => {
                r#"
                (import_statement name: (dotted_name) @module) @import
                (import_statement name: (aliased_import name: (dotted_name) @module)) @import
                (import_from_statement module_name: (dotted_name) @module) @import
                (import_from_statement module_name: (relative_import) @module) @import
                (class_definition
                  name: (identifier) @subclass
                  superclasses: (argument_list (identifier) @parent)) @extends
                "#
            }
            Language::JavaScript => {
                r#"
                (import_statement source: (string (string_fragment) @module)) @import
                (class_declaration
                  name: (identifier) @subclass
                  (class_heritage (identifier) @parent)) @extends
                "#
            }
            Language::TypeScript => {
                r#"
                (import_statement source: (string (string_fragment) @module)) @import
                (class_declaration
                  name: (type_identifier) @subclass
                  (class_heritage (extends_clause (identifier) @parent))) @extends
                "#
            }
            _ => "",
        }
    }

    fn capture_to_symbol_kind(capture_name: &str) -> SymbolKind {
        match capture_name {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "module" => SymbolKind::Module,
            _ => SymbolKind::Other,
        }
    }

    fn extract_symbols(
        &self,
        file: &FileRecord,
        content: &str,
        ts_language: &tree_sitter::Language,
        tree: &tree_sitter::Tree,
    ) -> Result<Vec<SymbolRecord>, DomainError> {
        let query_source = self.symbol_query_patterns(file.language());
        if query_source.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new(ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to create symbol query: {}", e)))?;

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        let mut symbols = Vec::new();
        while let Some(query_match) = matches_iter.next() {
            let mut symbol_name: Option<String> = None;
            let mut main_node = None;
            let mut kind = SymbolKind::Other;

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "name" {
                    symbol_name = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    kind = Self::capture_to_symbol_kind(capture_name);
                }
            }

            if let (Some(name), Some(node)) = (symbol_name, main_node) {
                let start_line = node.start_position().row as u32 + 1;
                let end_line = node.end_position().row as u32 + 1;
                symbols.push(SymbolRecord::new(
                    file.repository_id().to_string(),
                    file.path().to_string(),
                    name,
                    kind,
                    start_line,
                    end_line,
                ));
            }
        }
        Ok(symbols)
    }

    fn extract_references(
        &self,
        file: &FileRecord,
        content: &str,
        ts_language: &tree_sitter::Language,
        tree: &tree_sitter::Tree,
    ) -> Result<Vec<SymbolReference>, DomainError> {
        let query_source = self.reference_query_patterns(file.language());
        if query_source.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new(ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to create reference query: {}", e)))?;

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        let mut references = Vec::new();
        while let Some(query_match) = matches_iter.next() {
            let mut module: Option<(String, u32)> = None;
            let mut subclass: Option<String> = None;
            let mut parent: Option<(String, u32)> = None;

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                let text = content[capture.node.byte_range()].to_string();
                let line = capture.node.start_position().row as u32 + 1;
                match capture_name {
                    "module" => module = Some((text, line)),
                    "subclass" => subclass = Some(text),
                    "parent" => parent = Some((text, line)),
                    _ => {}
                }
            }

            if let Some((target, line)) = module {
                references.push(SymbolReference::imports(
                    file.repository_id().to_string(),
                    file.path().to_string(),
                    target,
                    line,
                ));
            }
            if let (Some(name), Some((target, line))) = (subclass, parent) {
                references.push(SymbolReference::extends(
                    file.repository_id().to_string(),
                    file.path().to_string(),
                    name,
                    target,
                    line,
                ));
            }
        }
        Ok(references)
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    async fn parse_file(
        &self,
        file: &FileRecord,
        content: &str,
    ) -> Result<ParseOutcome, DomainError> {
        let ts_language = match self.get_ts_language(file.language()) {
            Some(language) => language,
            None => {
                debug!("No grammar for {}, skipping", file.path());
                return Ok(ParseOutcome::empty());
            }
        };

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DomainError::parse(format!("Failed to set language: {}", e)))?;

        let tree = match parser.parse(content, None) {
            Some(tree) => tree,
            None => {
                warn!("Failed to parse {}, continuing without symbols", file.path());
                return Ok(ParseOutcome::empty());
            }
        };

        let symbols = self.extract_symbols(file, content, &ts_language, &tree)?;
        let references = self.extract_references(file, content, &ts_language, &tree)?;

        debug!(
            "Parsed {} symbols and {} references from {}",
            symbols.len(),
            references.len(),
            file.path()
        );
        Ok(ParseOutcome {
            symbols,
            references,
        })
    }

    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> FileRecord {
        FileRecord::new("test-repo".to_string(), path.to_string(), content)
    }

    #[tokio::test]
    async fn test_parse_python_symbols_and_imports() {
        let parser = TreeSitterParser::new();
        let content = r#"
import os
from collections import OrderedDict
from .util import helper

def handler(request):
    return request

class Store:
    def get(self, key):
        return None
"#;

        let outcome = parser
            .parse_file(&file("app.py", content), content)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.symbols.iter().map(|s| s.name()).collect();
        assert!(names.contains(&"handler"));
        assert!(names.contains(&"Store"));
        assert!(names.contains(&"get"));

        let handler = outcome.symbols.iter().find(|s| s.name() == "handler").unwrap();
        assert_eq!(handler.kind(), SymbolKind::Function);
        assert_eq!(handler.start_line(), 6);

        let targets: Vec<&str> = outcome.references.iter().map(|r| r.target()).collect();
        assert!(targets.contains(&"os"));
        assert!(targets.contains(&"collections"));
        assert!(targets.contains(&".util"));
    }

    #[tokio::test]
    async fn test_parse_python_inheritance() {
        let parser = TreeSitterParser::new();
        let content = r#"
class Base:
    pass

class Admin(Base, Mixin):
    pass
"#;

        let outcome = parser
            .parse_file(&file("models.py", content), content)
            .await
            .unwrap();

        let extends: Vec<&SymbolReference> = outcome
            .references
            .iter()
            .filter(|r| r.symbol_name().is_some())
            .collect();
        assert_eq!(extends.len(), 2);
        assert!(extends
            .iter()
            .all(|r| r.symbol_name() == Some("Admin")));
        let parents: Vec<&str> = extends.iter().map(|r| r.target()).collect();
        assert!(parents.contains(&"Base"));
        assert!(parents.contains(&"Mixin"));
    }

    #[tokio::test]
    async fn test_parse_typescript_class_and_imports() {
        let parser = TreeSitterParser::new();
        let content = r#"
import { helper } from "./util";

export class Widget extends Component {
    render(): string {
        return "widget";
    }
}

export const format = (value: string) => value.trim();
"#;

        let outcome = parser
            .parse_file(&file("widget.ts", content), content)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.symbols.iter().map(|s| s.name()).collect();
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"format"));

        let imports: Vec<&str> = outcome
            .references
            .iter()
            .filter(|r| r.symbol_name().is_none())
            .map(|r| r.target())
            .collect();
        assert_eq!(imports, vec!["./util"]);

        let extends: Vec<&SymbolReference> = outcome
            .references
            .iter()
            .filter(|r| r.symbol_name().is_some())
            .collect();
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].target(), "Component");
    }

    #[tokio::test]
    async fn test_parse_javascript_imports() {
        let parser = TreeSitterParser::new();
        let content = r#"
import { render } from "./render";
import config from "../config";

function start() {
    render(config);
}
"#;

        let outcome = parser
            .parse_file(&file("src/main.js", content), content)
            .await
            .unwrap();

        let targets: Vec<&str> = outcome.references.iter().map(|r| r.target()).collect();
        assert!(targets.contains(&"./render"));
        assert!(targets.contains(&"../config"));
        assert_eq!(outcome.symbols.len(), 1);
        assert_eq!(outcome.symbols[0].name(), "start");
    }

    #[tokio::test]
    async fn test_parse_rust_items() {
        let parser = TreeSitterParser::new();
        let content = r#"
pub struct Config {
    pub value: u32,
}

pub fn load() -> Config {
    Config { value: 1 }
}
"#;

        let outcome = parser
            .parse_file(&file("config.rs", content), content)
            .await
            .unwrap();

        let config = outcome.symbols.iter().find(|s| s.name() == "Config").unwrap();
        assert_eq!(config.kind(), SymbolKind::Class);
        let load = outcome.symbols.iter().find(|s| s.name() == "load").unwrap();
        assert_eq!(load.kind(), SymbolKind::Function);
    }

    #[tokio::test]
    async fn test_parse_go_declarations() {
        let parser = TreeSitterParser::new();
        let content = r#"
package main

type Server struct {
    addr string
}

func (s *Server) Run() error {
    return nil
}

func main() {
}
"#;

        let outcome = parser
            .parse_file(&file("main.go", content), content)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.symbols.iter().map(|s| s.name()).collect();
        assert!(names.contains(&"Server"));
        assert!(names.contains(&"Run"));
        assert!(names.contains(&"main"));
    }

    #[tokio::test]
    async fn test_malformed_source_does_not_error() {
        let parser = TreeSitterParser::new();
        let content = "def broken(:\n    ???\nclass {{{\n";

        let outcome = parser
            .parse_file(&file("broken.py", content), content)
            .await
            .unwrap();

        // tree-sitter recovers what it can; the point is that parsing never
        // fails the pipeline.
        assert!(outcome.symbols.len() <= 2);
    }

    #[tokio::test]
    async fn test_unknown_language_yields_empty_outcome() {
        let parser = TreeSitterParser::new();
        let content = "# just text\n";

        let outcome = parser
            .parse_file(&file("notes.txt", content), content)
            .await
            .unwrap();

        assert!(outcome.is_empty());
    }
}
