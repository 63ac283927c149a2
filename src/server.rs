//! HTTP invocation boundary.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Run one ingestion job for `{brainId, sourceId}` |
//! | `GET`  | `/jobs/{id}` | Job record (status, progress, logs) |
//! | `GET`  | `/brains/{id}/facts` | Current facts of a brain |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "BAD_REQUEST", "message": "brainId is required" } }
//! ```
//!
//! Error codes: `BAD_REQUEST` (400), `NOT_FOUND` (404), `INGEST_ERROR` (500),
//! `INTERNAL` (500).
//!
//! `POST /ingest` runs the job to completion before responding. A finished
//! job answers `202` with `status: "completed"`; a failed job answers `500`
//! with the failure message.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use brain_ingest_core::models::{Fact, IngestJob, JobStatus};
use brain_ingest_core::store::BrainStore;

use crate::config::Config;
use crate::db;
use crate::ingest::IngestPipeline;
use crate::migrate::migrate_pool;
use crate::sqlite_store::SqliteStore;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn BrainStore>,
    pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(store: Arc<dyn BrainStore>, pipeline: Arc<IngestPipeline>) -> Self {
        Self { store, pipeline }
    }
}

/// The application router with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/jobs/{id}", get(handle_get_job))
        .route("/brains/{id}/facts", get(handle_list_facts))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let store: Arc<dyn BrainStore> = Arc::new(SqliteStore::new(pool));
    let pipeline = Arc::new(IngestPipeline::from_config(config, store.clone())?);
    let app = router(AppState::new(store, pipeline));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "ingest server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    code: &'static str,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.message,
                code: self.code,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "BAD_REQUEST",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "NOT_FOUND",
        message: message.into(),
    }
}

fn ingest_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "INGEST_ERROR",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "INTERNAL",
        message: format!("{:#}", err),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    brain_id: Option<String>,
    source_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    job_id: String,
    status: &'static str,
    facts_added: u64,
    facts_updated: u64,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", name)))
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let brain_id = required(request.brain_id, "brainId")?;
    let source_id = required(request.source_id, "sourceId")?;

    let outcome = state
        .pipeline
        .run(&brain_id, &source_id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                not_found(e.to_string())
            } else {
                ingest_error(format!("{:#}", e))
            }
        })?;

    if outcome.status != JobStatus::Success {
        return Err(ingest_error(
            outcome
                .error
                .unwrap_or_else(|| format!("Ingestion job {} failed", outcome.job_id)),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            job_id: outcome.job_id,
            status: "completed",
            facts_added: outcome.facts_added,
            facts_updated: outcome.facts_updated,
        }),
    ))
}

// ============ GET /jobs/{id} ============

async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IngestJob>, AppError> {
    state
        .store
        .get_job(&id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("job not found: {}", id)))
}

// ============ GET /brains/{id}/facts ============

#[derive(Serialize)]
struct FactsResponse {
    facts: Vec<Fact>,
}

async fn handle_list_facts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FactsResponse>, AppError> {
    let facts = state.store.list_facts(&id).await.map_err(internal)?;
    Ok(Json(FactsResponse { facts }))
}
