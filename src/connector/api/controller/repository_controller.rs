use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::use_cases::GraphView;
use crate::connector::api::container::Container;
use crate::connector::api::error::ApiError;
use crate::domain::models::{AnalysisStatus, Repository};

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: AnalysisStatus,
    pub status_message: String,
    pub updated_at: i64,
}

/// `POST /api/repositories` — queue a repository for analysis. The pipeline
/// runs in the background; the pending record is returned immediately.
pub async fn create_repository(
    State(container): State<Arc<Container>>,
    Json(request): Json<CreateRepositoryRequest>,
) -> Result<(StatusCode, Json<Repository>), ApiError> {
    let repository = container.analyze_use_case().submit(&request.url).await?;
    Ok((StatusCode::ACCEPTED, Json(repository)))
}

/// `GET /api/repositories`
pub async fn list_repositories(
    State(container): State<Arc<Container>>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let repositories = container.list_use_case().execute().await?;
    Ok(Json(repositories))
}

/// `GET /api/repositories/{id}`
pub async fn get_repository(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<Json<Repository>, ApiError> {
    let repository = container.list_use_case().find(&id).await?;
    Ok(Json(repository))
}

/// `GET /api/repositories/{id}/status`
pub async fn repository_status(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let repository = container.list_use_case().find(&id).await?;
    Ok(Json(StatusResponse {
        id: repository.id().to_string(),
        status: repository.status(),
        status_message: repository.status_message().to_string(),
        updated_at: repository.updated_at(),
    }))
}

/// `GET /api/repositories/{id}/graph`
pub async fn repository_graph(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<Json<GraphView>, ApiError> {
    let view = container.graph_use_case().execute(&id).await?;
    Ok(Json(view))
}

/// `POST /api/repositories/{id}/cancel` — request that a running analysis
/// stop at its next checkpoint.
pub async fn cancel_analysis(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    container.analyze_use_case().cancel(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `DELETE /api/repositories/{id}` — remove the repository and everything
/// derived from it.
pub async fn delete_repository(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    container.delete_use_case().execute(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
