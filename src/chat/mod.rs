// Retrieval-augmented answering: embed, search, gate, fall back, prompt, complete

pub mod prompt;


use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use self::prompt::{ContextBlock, PromptParts, build_prompt};
use crate::completion::{CompletionError, CompletionMessage, OpenRouterClient};
use crate::config::{ChatbotConfig, Config, RetrievalConfig, WebSearchConfig};
use crate::database::{ScoredChunk, VectorStore};
use crate::embeddings::GeminiEmbedder;

/// Who sent a chat message. The widget calls the assistant `model`; any role
/// it never sends parses as `Other` and is left out of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    User,
    Model,
    Other,
}

impl From<String> for Role {
    #[inline]
    fn from(role: String) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "model" | "assistant" => Self::Model,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid chat request: {0}")]
    InvalidRequest(String),
    #[error("Vector search failed: {0}")]
    VectorSearch(String),
    #[error("Completion provider rate limit exceeded")]
    RateLimited,
    #[error("Completion failed: {0}")]
    Completion(CompletionError),
}

impl From<CompletionError> for ChatError {
    #[inline]
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::RateLimited => Self::RateLimited,
            other => Self::Completion(other),
        }
    }
}

/// Kind of context an answer drew on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    CompanyDocuments,
    WebSearch,
}

impl ContextSource {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::CompanyDocuments => "Company Documents (RAG)",
            Self::WebSearch => "Web Search",
        }
    }
}

/// Context sources used for an answer; empty means general knowledge only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLabel(Vec<ContextSource>);

impl SourceLabel {
    #[inline]
    pub fn sources(&self) -> &[ContextSource] {
        &self.0
    }

    #[inline]
    pub fn is_general_knowledge(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SourceLabel {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("General Knowledge");
        }
        let labels: Vec<&str> = self.0.iter().map(|source| source.label()).collect();
        f.write_str(&labels.join(" + "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub response: String,
    pub source: SourceLabel,
    /// Stored chunks placed in the prompt
    pub context_chunks: usize,
}

/// Hits whose score is strictly above `threshold`, order preserved
#[inline]
pub fn confident_hits(hits: Vec<ScoredChunk>, threshold: f32) -> Vec<ScoredChunk> {
    hits.into_iter().filter(|hit| hit.score > threshold).collect()
}

pub struct ChatService {
    embedder: GeminiEmbedder,
    store: Arc<VectorStore>,
    completion: OpenRouterClient,
    retrieval: RetrievalConfig,
    web_search: WebSearchConfig,
    chatbot: ChatbotConfig,
}

impl ChatService {
    #[inline]
    pub fn new(config: &Config, store: Arc<VectorStore>) -> Self {
        Self {
            embedder: GeminiEmbedder::new(&config.gemini),
            store,
            completion: OpenRouterClient::new(&config.openrouter),
            retrieval: config.retrieval.clone(),
            web_search: config.web_search.clone(),
            chatbot: config.chatbot.clone(),
        }
    }

    /// Answer the last message of `messages`, using earlier ones as history
    #[inline]
    pub async fn answer(&self, messages: &[ChatMessage]) -> Result<ChatAnswer, ChatError> {
        let Some((latest, earlier)) = messages.split_last() else {
            return Err(ChatError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        };
        let query = latest.content.trim();
        if query.is_empty() {
            return Err(ChatError::InvalidRequest(
                "the last message has no content".to_string(),
            ));
        }
        info!("Received query: {}", query);

        let mut context = Vec::new();
        let mut sources = Vec::new();
        let mut context_chunks = 0;

        let hits = self.retrieve(query).await?;
        let confident = confident_hits(hits, self.retrieval.score_threshold);
        if !confident.is_empty() {
            context_chunks = confident.len();
            context.push(ContextBlock::InternalDocuments(
                confident.into_iter().map(|hit| hit.chunk.text).collect(),
            ));
            sources.push(ContextSource::CompanyDocuments);
        } else if let Some(result) = self.search_web(query).await {
            context.push(ContextBlock::WebSearch(result));
            sources.push(ContextSource::WebSearch);
        }

        let source = SourceLabel(sources);
        info!("Using source: {}", source);

        let history_start = earlier.len().saturating_sub(self.retrieval.history_turns);
        let prompt = build_prompt(&PromptParts {
            system_prompt: &self.chatbot.system_prompt,
            context: &context,
            history: &earlier[history_start..],
            query,
            assistant_name: &self.chatbot.name,
        });
        debug!("Prompt is {} bytes", prompt.len());

        let response = self
            .completion
            .complete(self.completion.model(), vec![CompletionMessage::user(prompt)])
            .await?;

        let response = if response.trim().is_empty() {
            warn!("Completion was empty, using fallback response");
            self.chatbot.fallback_response.clone()
        } else {
            response
        };

        Ok(ChatAnswer {
            response,
            source,
            context_chunks,
        })
    }

    /// Nearest stored chunks for `query`. Embedding problems skip the search;
    /// store failures are errors.
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, ChatError> {
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Skipping vector search, query embedding failed: {}", e);
                return Ok(Vec::new());
            }
        };

        let hits = self
            .store
            .search_similar(&embedding, self.retrieval.limit)
            .await
            .map_err(|e| ChatError::VectorSearch(e.to_string()))?;

        info!("Vector search returned {} results", hits.len());
        for (i, hit) in hits.iter().enumerate() {
            info!(
                "Result {}: Score {:.4} - Snippet: {}...",
                i + 1,
                hit.score,
                hit.chunk.snippet(50)
            );
        }
        Ok(hits)
    }

    /// Ask the search model directly. Any problem means no web context.
    async fn search_web(&self, query: &str) -> Option<String> {
        if !self.web_search.enabled || !self.completion.has_api_key() {
            debug!("Web search unavailable, skipping");
            return None;
        }

        match self
            .completion
            .complete(&self.web_search.model, vec![CompletionMessage::user(query)])
            .await
        {
            Ok(result) if !result.trim().is_empty() => {
                info!("Web search returned {} bytes", result.len());
                Some(result)
            }
            Ok(_) => {
                debug!("Web search returned nothing");
                None
            }
            Err(e) => {
                warn!("Web search failed: {}", e);
                None
            }
        }
    }
}
