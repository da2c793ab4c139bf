pub mod application;
pub mod connector;
pub mod domain;

pub use application::{
    AnalysisConfig, AnalyzeRepositoryUseCase, AskRepositoryUseCase, BrowseRepositoryUseCase,
    ChatModel, DeleteRepositoryUseCase, EmbeddingService, ExplainFileUseCase, FileRepository,
    GraphRepository, ListRepositoriesUseCase, MetadataRepository, ParserService, ProgressHub,
    RagConfig, RepositoryGraphUseCase, SourceFetcher, VectorRepository,
};

pub use connector::api::{build_router, Container, ContainerConfig};
pub use connector::{
    DuckdbFileRepository, DuckdbGraphRepository, DuckdbMetadataRepository, DuckdbVectorRepository,
    GitFetcher, HttpEmbedding, InMemoryVectorRepository, MockChatModel, MockEmbedding, OpenAiChat,
    TreeSitterParser,
};

pub use domain::{
    AnalysisStatus, Answer, ChatTurn, CodeChunk, DomainError, Embedding, EmbeddingConfig,
    FileRecord, GraphData, Language, Repository, SearchQuery, SearchResult, StatusUpdate,
};
