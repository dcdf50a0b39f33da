
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::http::{HttpError, RetryPolicy, build_agent, call_with_retry};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Gemini API key is not configured")]
    MissingApiKey,
    #[error("Embedding request failed: {0}")]
    Http(#[from] HttpError),
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    #[error("Embedding response contained no values")]
    EmptyEmbedding,
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding task failed: {0}")]
    Task(String),
}

/// Client for the Gemini `embedContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: u32,
    retry_policy: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: RequestContent<'a>,
    output_dimensionality: u32,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbedder {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            agent: build_agent(config.timeout(), None),
            endpoint: format!(
                "{}/v1beta/models/{}:embedContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            dimension: config.embedding_dimension,
            retry_policy: RetryPolicy::new(config.retry_attempts, Duration::from_secs(1)),
        }
    }

    #[inline]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension as usize
    }

    /// Embed `text` on the blocking pool
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.has_api_key() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let embedder = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_blocking(&text))
            .await
            .map_err(|e| EmbeddingError::Task(e.to_string()))?
    }

    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.has_api_key() {
            return Err(EmbeddingError::MissingApiKey);
        }

        debug!(
            "Generating embedding with {} for text (length: {})",
            self.model,
            text.len()
        );

        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: RequestContent {
                parts: [RequestPart { text }],
            },
            output_dimensionality: self.dimension,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let response_text = call_with_retry(&self.endpoint, &self.retry_policy, || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", self.api_key.as_str())
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let values = response.embedding.values;
        if values.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        if values.len() != self.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension(),
                actual: values.len(),
            });
        }

        debug!("Generated embedding with {} dimensions", values.len());
        Ok(values)
    }
}
