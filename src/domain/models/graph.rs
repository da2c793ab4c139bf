use serde::{Deserialize, Serialize};

use super::language::Language;
use super::symbol::SymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNodeType {
    File,
    Symbol,
}

impl GraphNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphNodeType::File => "file",
            GraphNodeType::Symbol => "symbol",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "symbol" => GraphNodeType::Symbol,
            _ => GraphNodeType::File,
        }
    }
}

/// Relationship carried by a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    /// File imports file.
    Imports,
    /// Symbol extends symbol.
    Extends,
    /// File contains symbol.
    Contains,
}

impl EdgeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRelation::Imports => "imports",
            EdgeRelation::Extends => "extends",
            EdgeRelation::Contains => "contains",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "imports" => Some(EdgeRelation::Imports),
            "extends" => Some(EdgeRelation::Extends),
            "contains" => Some(EdgeRelation::Contains),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the repository structure graph. Ids are deterministic:
/// `file:{path}` for files, `sym:{symbol_id}` for symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: GraphNodeType,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<SymbolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl GraphNode {
    pub fn file(path: &str, language: Language) -> Self {
        Self {
            id: file_node_id(path),
            label: path.to_string(),
            node_type: GraphNodeType::File,
            file_path: path.to_string(),
            language: Some(language),
            symbol_kind: None,
            start_line: None,
            end_line: None,
        }
    }

    pub fn symbol(
        symbol_id: &str,
        name: &str,
        kind: SymbolKind,
        file_path: &str,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            id: symbol_node_id(symbol_id),
            label: name.to_string(),
            node_type: GraphNodeType::Symbol,
            file_path: file_path.to_string(),
            language: None,
            symbol_kind: Some(kind),
            start_line: Some(start_line),
            end_line: Some(end_line),
        }
    }
}

pub fn file_node_id(path: &str) -> String {
    format!("file:{}", path)
}

pub fn symbol_node_id(symbol_id: &str) -> String {
    format!("sym:{}", symbol_id)
}

/// A directed edge between two graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: EdgeRelation,
}

impl GraphEdge {
    pub fn new(source: String, target: String, relation: EdgeRelation) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }
}

/// The full structure graph for one repository. Nodes and edges are kept in
/// a deterministic sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges whose source or target is `node_id`.
    pub fn edges_touching(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id || e.target == node_id)
            .collect()
    }
}
