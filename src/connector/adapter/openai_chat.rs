use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::application::ChatModel;
use crate::domain::models::ChatTurn;
use crate::domain::DomainError;

/// Default target: Ollama running locally on its standard port.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const CHAT_PATH: &str = "/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama3.2";
const MAX_TOKENS: u32 = 1024;

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// HTTP client for OpenAI-compatible `/v1/chat/completions` endpoints
/// (Ollama, LM Studio, or the OpenAI cloud).
///
/// **Local-first defaults**: targets Ollama on `http://localhost:11434`
/// without an API key. Override via environment variables:
///
/// ```text
/// CODEATLAS_CHAT_BASE_URL=https://api.openai.com
/// CODEATLAS_CHAT_API_KEY=sk-...
/// CODEATLAS_CHAT_MODEL=gpt-4o-mini
/// ```
///
/// Before each request the client sends a lightweight `HEAD /` probe with a
/// 2-second timeout. If the server isn't reachable (connection refused or
/// probe timeout) the call fails immediately instead of hanging for 60 s.
pub struct OpenAiChat {
    client: reqwest::Client,
    /// Cheap connectivity check — short timeout, discards the response body.
    probe_client: reqwest::Client,
    api_key: String,
    model: String,
    /// Full endpoint URL (base + CHAT_PATH).
    url: String,
    /// Base URL used for the probe.
    base_url: String,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base: String = base_url.into();
        let trimmed = base.trim_end_matches('/');
        let url = format!("{trimmed}{CHAT_PATH}");
        let base_url = format!("{trimmed}/");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            probe_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            url,
            base_url,
        }
    }

    /// Construct from environment variables with local-first defaults:
    ///
    /// | Variable                  | Default                  | Purpose                |
    /// |---------------------------|--------------------------|------------------------|
    /// | `CODEATLAS_CHAT_BASE_URL` | `http://localhost:11434` | Ollama / any server    |
    /// | `CODEATLAS_CHAT_MODEL`    | `llama3.2`               | Chat model to query    |
    /// | `CODEATLAS_CHAT_API_KEY`  | `""` (empty)             | Not required for local |
    pub fn from_env() -> Self {
        let base = std::env::var("CODEATLAS_CHAT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("CODEATLAS_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("CODEATLAS_CHAT_API_KEY").unwrap_or_default();
        Self::new(key, model, base)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, messages: &[ChatTurn]) -> Result<String, DomainError> {
        // Fast connectivity probe. Any HTTP response — even 4xx/5xx — means
        // the server is up; only connection-refused or probe timeout fail.
        match self.probe_client.head(&self.base_url).send().await {
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(DomainError::model(format!(
                    "Chat server not reachable at {}: {e}",
                    self.base_url.trim_end_matches('/')
                )));
            }
            _ => {}
        }

        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        api_messages.push(ApiMessage {
            role: "system",
            content: system,
        });
        for turn in messages {
            api_messages.push(ApiMessage {
                role: turn.role.as_str(),
                content: &turn.content,
            });
        }

        let request = ApiRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: api_messages,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::model(format!("Chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Chat API returned {status}: {body}");
            return Err(DomainError::model(format!("Chat API returned {status}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| DomainError::model(format!("Failed to parse chat response: {e}")))?;

        Ok(api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
