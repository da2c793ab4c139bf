pub mod analyze_repository;
pub mod ask_repository;
pub mod browse_repository;
pub mod delete_repository;
pub mod explain_file;
pub mod list_repositories;
pub mod repository_graph;

pub use analyze_repository::{AnalysisConfig, AnalyzeRepositoryUseCase};
pub use ask_repository::{AskRepositoryUseCase, RagConfig};
pub use browse_repository::{BrowseRepositoryUseCase, FileContent};
pub use delete_repository::DeleteRepositoryUseCase;
pub use explain_file::{ComplexityLabel, ExplainFileUseCase, FileExplanation, KeySymbol};
pub use list_repositories::ListRepositoriesUseCase;
pub use repository_graph::{GraphView, ModuleGroup, RepositoryGraphUseCase};
