//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/` | no | Banner |
//! | `GET`  | `/health` | no | Health check (returns version) |
//! | `POST` | `/hackrx/run` | bearer | Answer questions about one document |
//! | `GET`  | `/api/v1/status` | bearer | Processed-document count and index name |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "questions must not be empty" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `internal` (500).
//!
//! Authentication runs as route middleware, so a request with a missing or
//! wrong token is rejected before its body is read. The scheme name is
//! matched case-insensitively; the token must match exactly.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::rag::RagSystem;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    rag: Arc<RagSystem>,
    token: Arc<str>,
}

impl AppState {
    pub fn new(rag: Arc<RagSystem>, token: impl Into<String>) -> Self {
        Self {
            rag,
            token: Arc::from(token.into()),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/hackrx/run", post(handle_run))
        .route("/api/v1/status", get(handle_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let token = config.server.bearer_token()?;
    let rag = Arc::new(RagSystem::from_config(config)?);
    let app = router(AppState::new(rag, token));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "docqa server listening");
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
    code: String,
    message: String,
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
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "Invalid or missing bearer token".to_string(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(cause: impl std::fmt::Display) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("Internal server error: {}", cause),
    }
}

// ============ Auth ============

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .is_some_and(|(scheme, token)| {
            scheme.eq_ignore_ascii_case("bearer") && token == &*state.token
        });

    if !authorized {
        warn!(path = %request.uri().path(), "rejected request with bad bearer token");
        return Err(unauthorized());
    }
    Ok(next.run(request).await)
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct BannerResponse {
    message: String,
}

async fn handle_root() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "docqa document question-answering API".to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /hackrx/run ============

#[derive(Deserialize)]
struct RunRequest {
    documents: String,
    questions: Vec<String>,
}

#[derive(Serialize)]
struct RunResponse {
    answers: Vec<String>,
}

async fn handle_run(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let document = req.documents.trim().to_string();
    if document.is_empty() {
        return Err(bad_request("documents must not be empty"));
    }
    if req.questions.is_empty() {
        return Err(bad_request("questions must not be empty"));
    }

    info!(questions = req.questions.len(), "processing run request");

    // Run on its own task so a panic inside the pipeline surfaces as a 500.
    let rag = Arc::clone(&state.rag);
    let questions = req.questions;
    let answers = tokio::spawn(async move { rag.answer_questions(&document, &questions).await })
        .await
        .map_err(internal)?;

    Ok(Json(RunResponse { answers }))
}

// ============ GET /api/v1/status ============

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    processed_documents: usize,
    index_name: String,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.rag.status();
    Json(StatusResponse {
        status: "operational".to_string(),
        processed_documents: status.processed_documents,
        index_name: status.index_name,
    })
}
