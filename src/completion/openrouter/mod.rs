
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::OpenRouterConfig;
use crate::http::{HttpError, RetryPolicy, build_agent, call_with_retry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("OpenRouter API key is not configured")]
    MissingApiKey,
    #[error("Completion provider rate limit exceeded")]
    RateLimited,
    #[error("Completion provider returned HTTP {0}")]
    Upstream(u16),
    #[error("Completion transport error: {0}")]
    Transport(String),
    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
}

impl From<HttpError> for CompletionError {
    #[inline]
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Status(429) => Self::RateLimited,
            HttpError::Status(status) => Self::Upstream(status),
            HttpError::Transport(message) => Self::Transport(message),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum CompletionRole {
    User,
}

/// A chat-completions message. Prompts are always sent as a single user turn.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletionMessage {
    role: CompletionRole,
    content: String,
}

impl CompletionMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: CompletionRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client for OpenRouter
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    model: String,
    retry_policy: RetryPolicy,
}

impl OpenRouterClient {
    #[inline]
    pub fn new(config: &OpenRouterConfig) -> Self {
        Self {
            agent: build_agent(config.timeout(), None),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            retry_policy: RetryPolicy::new(config.retry_attempts, Duration::from_secs(1)),
        }
    }

    #[inline]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Model used for answers
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a completion on the blocking pool. Returns the first choice's
    /// content, or an empty string when the provider sent none.
    #[inline]
    pub async fn complete(
        &self,
        model: &str,
        messages: Vec<CompletionMessage>,
    ) -> Result<String, CompletionError> {
        if !self.has_api_key() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = self.clone();
        let model = model.to_string();
        tokio::task::spawn_blocking(move || client.complete_blocking(&model, &messages))
            .await
            .map_err(|e| CompletionError::Transport(format!("completion task failed: {e}")))?
    }

    #[inline]
    pub fn complete_blocking(
        &self,
        model: &str,
        messages: &[CompletionMessage],
    ) -> Result<String, CompletionError> {
        if !self.has_api_key() {
            return Err(CompletionError::MissingApiKey);
        }

        debug!(
            "Requesting completion from {} with {} messages",
            model,
            messages.len()
        );

        let request_json = serde_json::to_string(&ChatRequest { model, messages })
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        let auth = format!("Bearer {}", self.api_key);

        let response_text = call_with_retry(&self.endpoint, &self.retry_policy, || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Authorization", auth.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        debug!("Completion from {} returned {} bytes", model, content.len());
        Ok(content)
    }
}
