use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::connector::api::container::Container;
use crate::connector::api::error::ApiError;
use crate::domain::models::{Answer, ChatTurn};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub repository_id: String,
    pub message: String,
    /// Prior turns, oldest first. Supplied by the client per request; the
    /// server keeps no conversation state.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// `POST /api/chat` — answer a question about an analyzed repository with
/// retrieved code as context.
pub async fn chat(
    State(container): State<Arc<Container>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Answer>, ApiError> {
    let answer = container
        .ask_use_case()
        .execute(&request.repository_id, &request.message, &request.history)
        .await?;
    Ok(Json(answer))
}
