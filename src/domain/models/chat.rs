use serde::{Deserialize, Serialize};

use super::repository::{current_timestamp, AnalysisStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation. History is supplied by the caller per request
/// and never persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A source citation attached to a generated answer, ordered by retrieval
/// rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    pub score: f32,
}

/// The answer returned for a repository question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl Answer {
    pub fn new(answer: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            answer: answer.into(),
            sources,
        }
    }

    pub fn without_sources(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// A progress event published while an analysis runs. Subscribers receive
/// these over the repository's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub repository_id: String,
    pub status: AnalysisStatus,
    pub message: String,
    pub timestamp: i64,
}

impl StatusUpdate {
    pub fn new(repository_id: impl Into<String>, status: AnalysisStatus, message: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            status,
            message: message.into(),
            timestamp: current_timestamp(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
