//! HTTP API server exposing the service contracts.
//!
//! On startup the documents directory is ingested in the background; the
//! generation scheduler waits on that, runs its initial pass, and then
//! ticks periodically until shutdown.

use crate::cli::Output;
use crate::config::Settings;
use crate::generation::{GenerationScheduler, IngestionSignal};
use crate::questions::QuestionSet;
use crate::search::SearchQuery;
use crate::service::Service;
use crate::UndreError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state.
struct AppState {
    service: Arc<Service>,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let service = Arc::new(Service::new(settings)?);
    let cancel = CancellationToken::new();
    let signal = Arc::new(IngestionSignal::new());

    // Startup ingestion resolves the signal exactly once, even on failure.
    {
        let service = service.clone();
        let signal = signal.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let documents_dir = service.settings().documents_dir();
            match service.pipeline().ingest_directory(&documents_dir, &cancel).await {
                Ok(reports) => {
                    for (file_name, report) in &reports {
                        info!(
                            "Processed '{}': {}/{} chunks stored",
                            file_name, report.successful_count, report.total_processed
                        );
                    }
                }
                Err(e) => warn!("Startup ingestion failed: {}", e),
            }
            signal.notify();
        });
    }

    // Periodic question generation, gated on the startup ingestion.
    {
        let generator = service.generator();
        let generation_settings = service.settings().generation.clone();
        let signal = signal.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let scheduler = GenerationScheduler::new(generator, &generation_settings);
            scheduler.run(&signal, cancel).await;
        });
    }

    let state = Arc::new(AppState { service });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/search", post(search))
        .route("/search/intent", post(search_with_intent))
        .route("/questions", get(suggest_questions).post(save_questions))
        .route("/questions/all", get(all_questions))
        .route("/questions/recent", get(recent_questions))
        .route("/questions/episode/{episode}", get(questions_by_episode))
        .route("/questions/topic/{topic}", get(questions_by_topic))
        .route("/questions/older-than/{days}", delete(purge_questions))
        .route("/questions/{id}", delete(delete_question))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Undre API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Ingest", "POST   /ingest");
    Output::kv("Search", "POST   /search");
    Output::kv("Intent Search", "POST   /search/intent");
    Output::kv("Suggest", "GET    /questions");
    Output::kv("Save Questions", "POST   /questions");
    Output::kv("All Questions", "GET    /questions/all");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            cancel.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestRequest {
    file_name: String,
    /// The transcript document, as its JSON array of items.
    document: serde_json::Value,
}

#[derive(Deserialize)]
struct IntentRequest {
    text: String,
}

#[derive(Deserialize)]
struct SuggestParams {
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default)]
    topic: Option<String>,
}

fn default_count() -> usize {
    5
}

#[derive(Deserialize)]
struct RecentParams {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    7
}

#[derive(Deserialize)]
struct SaveQuestionsRequest {
    source_episode_number: String,
    #[serde(default)]
    topics: Vec<String>,
    questions: Vec<String>,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    let bytes = match serde_json::to_vec(&req.document) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state
        .service
        .pipeline()
        .ingest_bytes(&bytes, &req.file_name, &CancellationToken::new())
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e @ UndreError::InvalidInput(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(query): Json<SearchQuery>,
) -> impl IntoResponse {
    Json(state.service.search(&query).await)
}

async fn search_with_intent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IntentRequest>,
) -> impl IntoResponse {
    Json(state.service.search_with_intent(&req.text).await)
}

async fn suggest_questions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> impl IntoResponse {
    let sets = state
        .service
        .generator()
        .suggest(params.count, params.topic.as_deref())
        .await;
    Json(sets)
}

async fn save_questions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveQuestionsRequest>,
) -> impl IntoResponse {
    let set = QuestionSet::new(req.source_episode_number, req.topics, req.questions);
    match state.service.question_store().save(set) {
        Ok(id) => Json(serde_json::json!({ "id": id })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn all_questions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.question_store().all())
}

async fn recent_questions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> impl IntoResponse {
    Json(state.service.question_store().generated_within_days(params.days))
}

async fn questions_by_episode(
    State(state): State<Arc<AppState>>,
    Path(episode): Path<String>,
) -> impl IntoResponse {
    Json(state.service.question_store().by_episode(&episode))
}

async fn questions_by_topic(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> impl IntoResponse {
    Json(state.service.question_store().by_topic(&topic))
}

async fn purge_questions(
    State(state): State<Arc<AppState>>,
    Path(days): Path<i64>,
) -> impl IntoResponse {
    let cutoff = Utc::now() - Duration::days(days);
    let removed = state.service.question_store().delete_older_than(cutoff);
    Json(serde_json::json!({ "removed": removed }))
}

async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if state.service.question_store().delete(id) {
        Json(serde_json::json!({ "deleted": id })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("Question set not found: {}", id))
    }
}
