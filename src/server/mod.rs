// JSON-over-HTTP surface for the chat widget and admin tooling


use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::{ChatError, ChatMessage, ChatService};
use crate::config::Config;
use crate::database::VectorStore;
use crate::ingest::Ingestor;
use crate::{Result, SiteChatError};

const INVALID_MESSAGES: &str = "Valid messages array is required";
const GENERIC_CHAT_ERROR: &str = "An error occurred while processing your request.";
const SNIPPET_CHARS: usize = 100;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    /// Locked for the whole run so admin ingestions never overlap
    ingestor: Arc<Mutex<Ingestor>>,
    store: Arc<VectorStore>,
}

impl AppState {
    #[inline]
    pub fn new(config: &Config, store: Arc<VectorStore>) -> Result<Self> {
        Ok(Self {
            chat: Arc::new(ChatService::new(config, Arc::clone(&store))),
            ingestor: Arc::new(Mutex::new(Ingestor::new(config, Arc::clone(&store))?)),
            store,
        })
    }
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/admin/scrape", any(scrape))
        .route("/api/admin/stats", get(stats))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the chunk store and serve until Ctrl-C
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let store = Arc::new(VectorStore::open(config).await?);
    let app = router(AppState::new(config, store)?);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| {
            SiteChatError::Network(format!("Failed to bind {}: {}", config.server.bind, e))
        })?;
    info!("Listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
        }
    }
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// -- /api/chat --

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let messages = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) if !request.messages.is_empty() => request.messages,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, ErrorBody::new(INVALID_MESSAGES)),
        Err(e) => {
            warn!("Rejected chat request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, ErrorBody::new(INVALID_MESSAGES));
        }
    };

    match state.chat.answer(&messages).await {
        Ok(answer) => {
            info!("Answered from {}", answer.source);
            Json(ChatResponse {
                response: answer.response,
            })
            .into_response()
        }
        Err(ChatError::InvalidRequest(reason)) => {
            warn!("Rejected chat request: {}", reason);
            error_response(StatusCode::BAD_REQUEST, ErrorBody::new(INVALID_MESSAGES))
        }
        Err(ChatError::VectorSearch(details)) => {
            error!("Vector search failed: {}", details);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Vector Search Failure".to_string(),
                    details: Some(details),
                },
            )
        }
        Err(ChatError::RateLimited) => {
            warn!("Completion provider is rate limiting requests");
            error_response(
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::new("Too many requests. Please try again shortly."),
            )
        }
        Err(e @ ChatError::Completion(_)) => {
            error!("Error handling chat: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(GENERIC_CHAT_ERROR),
            )
        }
    }
}

// -- /api/admin/scrape --

#[derive(Default, Deserialize)]
struct ScrapeRequest {
    #[serde(default)]
    urls: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks_saved: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ScrapeResponse {
    fn failed(status: StatusCode, message: &str, error: String) -> Response {
        (
            status,
            Json(Self {
                success: false,
                message: message.to_string(),
                chunks_saved: None,
                error: Some(error),
            }),
        )
            .into_response()
    }
}

async fn scrape(State(state): State<AppState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ScrapeRequest::default()
    } else {
        match serde_json::from_slice::<ScrapeRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return ScrapeResponse::failed(
                    StatusCode::BAD_REQUEST,
                    "Invalid scrape request.",
                    e.to_string(),
                );
            }
        }
    };

    info!("Admin ingestion triggered");
    let ingestor = state.ingestor.lock().await;
    match ingestor.run(request.urls).await {
        Ok(report) => Json(ScrapeResponse {
            success: true,
            message: "Scraping and embedding completed successfully.".to_string(),
            chunks_saved: Some(report.chunks_saved()),
            error: None,
        })
        .into_response(),
        Err(e) => {
            error!("Admin ingestion failed: {}", e);
            ScrapeResponse::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to complete data ingestion.",
                e.to_string(),
            )
        }
    }
}

// -- /api/admin/stats --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    success: bool,
    total_chunks: usize,
    sample_snippet: String,
    source: String,
}

#[derive(Serialize)]
struct StatsError {
    success: bool,
    error: String,
}

async fn stats(State(state): State<AppState>) -> Response {
    let result = async {
        let total_chunks = state.store.count_chunks().await?;
        let sample = state.store.sample_chunk().await?;
        Ok::<_, SiteChatError>((total_chunks, sample))
    }
    .await;

    match result {
        Ok((total_chunks, sample)) => {
            let (sample_snippet, source) = sample.map_or_else(
                || ("No data found".to_string(), "N/A".to_string()),
                |chunk| (chunk.snippet(SNIPPET_CHARS), chunk.source_url),
            );
            Json(StatsResponse {
                success: true,
                total_chunks,
                sample_snippet,
                source,
            })
            .into_response()
        }
        Err(e) => {
            error!("Failed to read stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatsError {
                    success: false,
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
