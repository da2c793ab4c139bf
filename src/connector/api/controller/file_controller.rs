use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::application::use_cases::{FileContent, FileExplanation};
use crate::connector::api::container::Container;
use crate::connector::api::error::ApiError;
use crate::domain::models::FileRecord;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

/// `GET /api/repositories/{id}/files`
pub async fn list_files(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let files = container.browse_use_case().list_files(&id).await?;
    Ok(Json(files))
}

/// `GET /api/repositories/{id}/file?path=` — raw file content from the
/// checkout. Paths escaping the checkout root are rejected.
pub async fn file_content(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileContent>, ApiError> {
    let content = container
        .browse_use_case()
        .file_content(&id, &query.path)
        .await?;
    Ok(Json(content))
}

/// `GET /api/repositories/{id}/explain?path=` — model-written summary plus
/// key symbols and a complexity label for one file.
pub async fn explain_file(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileExplanation>, ApiError> {
    let explanation = container
        .explain_use_case()
        .execute(&id, &query.path)
        .await?;
    Ok(Json(explanation))
}
