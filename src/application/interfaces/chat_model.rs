use async_trait::async_trait;

use crate::domain::models::ChatTurn;
use crate::domain::DomainError;

/// Port for the answer-generating language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produces a completion for the given system prompt and conversation.
    /// The last turn is the current user question.
    async fn complete(&self, system: &str, messages: &[ChatTurn]) -> Result<String, DomainError>;

    fn model_name(&self) -> &str;
}
