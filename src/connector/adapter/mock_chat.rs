use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::ChatModel;
use crate::domain::models::ChatTurn;
use crate::domain::DomainError;

/// Canned chat model for offline runs and tests. Counts invocations so
/// callers can assert when the model was (or was not) consulted.
pub struct MockChatModel {
    response: String,
    calls: AtomicUsize,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::with_response(
            "This is a mock answer generated without a language model. \
             Enable a chat backend for real answers.",
        )
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _system: &str, _messages: &[ChatTurn]) -> Result<String, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_counts_calls() {
        let model = MockChatModel::with_response("canned");
        assert_eq!(model.calls(), 0);

        let turns = vec![ChatTurn::user("question")];
        let answer = model.complete("system", &turns).await.unwrap();

        assert_eq!(answer, "canned");
        assert_eq!(model.calls(), 1);
    }
}
