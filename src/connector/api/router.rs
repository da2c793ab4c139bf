use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use super::container::Container;
use super::controller::{
    chat_controller, file_controller, progress_controller, repository_controller,
};

/// Builds the HTTP API. All routes share the container as axum state.
pub fn build_router(container: Arc<Container>) -> Router {
    Router::new()
        .route(
            "/api/repositories",
            post(repository_controller::create_repository),
        )
        .route(
            "/api/repositories",
            get(repository_controller::list_repositories),
        )
        .route(
            "/api/repositories/{id}",
            get(repository_controller::get_repository),
        )
        .route(
            "/api/repositories/{id}",
            delete(repository_controller::delete_repository),
        )
        .route(
            "/api/repositories/{id}/status",
            get(repository_controller::repository_status),
        )
        .route(
            "/api/repositories/{id}/cancel",
            post(repository_controller::cancel_analysis),
        )
        .route(
            "/api/repositories/{id}/graph",
            get(repository_controller::repository_graph),
        )
        .route(
            "/api/repositories/{id}/files",
            get(file_controller::list_files),
        )
        .route(
            "/api/repositories/{id}/file",
            get(file_controller::file_content),
        )
        .route(
            "/api/repositories/{id}/explain",
            get(file_controller::explain_file),
        )
        .route(
            "/api/repositories/{id}/events",
            get(progress_controller::repository_events),
        )
        .route("/api/chat", post(chat_controller::chat))
        .with_state(container)
}
