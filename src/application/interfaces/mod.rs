pub mod chat_model;
pub mod embedding_service;
pub mod file_repository;
pub mod graph_repository;
pub mod metadata_repository;
pub mod parser_service;
pub mod source_fetcher;
pub mod vector_repository;

pub use chat_model::ChatModel;
pub use embedding_service::EmbeddingService;
pub use file_repository::FileRepository;
pub use graph_repository::GraphRepository;
pub use metadata_repository::MetadataRepository;
pub use parser_service::ParserService;
pub use source_fetcher::SourceFetcher;
pub use vector_repository::VectorRepository;
