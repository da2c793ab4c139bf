pub mod chunker;
pub mod graph_builder;

pub use chunker::{Chunker, ChunkerConfig};
pub use graph_builder::build_graph;
