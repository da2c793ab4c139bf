mod duckdb_file_repository;
mod duckdb_graph_repository;
mod duckdb_metadata_repository;
mod duckdb_vector_repository;
mod git_fetcher;
mod http_embedding;
mod in_memory_vector_repository;
mod mock_chat;
mod mock_embedding;
mod openai_chat;
mod treesitter_parser;

pub use duckdb_file_repository::*;
pub use duckdb_graph_repository::*;
pub use duckdb_metadata_repository::*;
pub use duckdb_vector_repository::*;
pub use git_fetcher::*;
pub use http_embedding::*;
pub use in_memory_vector_repository::*;
pub use mock_chat::*;
pub use mock_embedding::*;
pub use openai_chat::*;
pub use treesitter_parser::*;
