use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::domain::DomainError;

/// HTTP-facing wrapper around [`DomainError`]. Handlers return this so the
/// `?` operator maps domain failures straight to status codes.
#[derive(Debug)]
pub struct ApiError(DomainError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::AlreadyExists(_) | DomainError::NotReady(_) => StatusCode::CONFLICT,
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            // Upstream dependencies: the git remote, the embedding service,
            // or the chat model.
            DomainError::FetchError(_)
            | DomainError::EmbeddingError(_)
            | DomainError::ModelError(_) => StatusCode::BAD_GATEWAY,
            DomainError::ParseError(_)
            | DomainError::StorageError(_)
            | DomainError::IoError(_)
            | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
