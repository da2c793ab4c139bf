pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod graph;
pub mod language;
pub mod reference;
pub mod repository;
pub mod search_result;
pub mod source_file;
pub mod symbol;

pub use chat::{Answer, ChatRole, ChatTurn, SourceRef, StatusUpdate};
pub use chunk::CodeChunk;
pub use embedding::{Embedding, EmbeddingConfig, VECTOR_DIMENSIONS};
pub use graph::{
    file_node_id, symbol_node_id, EdgeRelation, GraphData, GraphEdge, GraphNode, GraphNodeType,
};
pub use language::Language;
pub use reference::{ReferenceKind, SymbolReference};
pub use repository::{current_timestamp, parse_origin, AnalysisStatus, LanguageStats, Repository};
pub use search_result::{SearchQuery, SearchResult};
pub use source_file::{compute_content_hash, FileRecord};
pub use symbol::{symbol_id, ParseOutcome, SymbolKind, SymbolRecord};
