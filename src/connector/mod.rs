//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Git fetch, tree-sitter parsing, embedding and chat clients
//! - Storage (DuckDB for metadata, files, graph, and vectors)
//! - The HTTP API (axum) and the dependency container

pub mod adapter;
pub mod api;

pub use adapter::*;
