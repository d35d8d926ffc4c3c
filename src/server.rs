//! HTTP service for the QA pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/predict` | Answer `{question}` with `{answer, score, context}` |
//! | `GET`  | `/health` | Always `{status: "ok"}`, whatever the load state |
//! | `GET`  | `/stats` | PNG confidence chart, or `{error}` before any answer |
//! | `GET`  | `/stats/summary` | Count/mean/max/min as JSON, or `{error}` |
//!
//! # Error Contract
//!
//! Unexpected failures anywhere in the call chain become
//!
//! ```json
//! { "detail": "<error message>" }
//! ```
//!
//! with status 500. Degraded and unanswerable cases are not errors: they are
//! ordinary answers with score 0.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analytics;
use crate::config::Config;
use crate::extraction::default_loader;
use crate::models::Answer;
use crate::service::QaService;

/// Body of `/stats` and `/stats/summary` while the history is empty.
pub const NOT_ENOUGH_DATA: &str = "Not enough data to build stats yet.";

/// Build the service with the compiled-in model backend, load it, and serve.
///
/// A failed load is logged and leaves the service degraded; the server still
/// starts so `/health` answers.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(QaService::new(config.clone(), default_loader()));
    if let Err(e) = service.load().await {
        tracing::warn!("serving in degraded mode: {:#}", e);
    }
    run_server_with_service(config, service).await
}

/// Serve an already-constructed service on `[server].bind`.
pub async fn run_server_with_service(
    config: &Config,
    service: Arc<QaService>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(service);

    tracing::info!("QA service listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(service: Arc<QaService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(handle_predict))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/stats/summary", get(handle_stats_summary))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Internal error type that converts into a 500 with the error text.
struct AppError(anyhow::Error);

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        let body = ErrorBody {
            detail: self.0.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct StatsMessage {
    error: String,
}

fn not_enough_data() -> Response {
    Json(StatsMessage {
        error: NOT_ENOUGH_DATA.to_string(),
    })
    .into_response()
}

// ============ POST /predict ============

#[derive(Deserialize)]
pub struct PredictRequest {
    pub question: String,
}

async fn handle_predict(
    State(service): State<Arc<QaService>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<Answer>, AppError> {
    let answer = service.predict(&req.question).await?;
    Ok(Json(answer))
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

// ============ GET /stats ============

async fn handle_stats(State(service): State<Arc<QaService>>) -> Result<Response, AppError> {
    let scores = service.history().scores();
    if scores.is_empty() {
        return Ok(not_enough_data());
    }

    let png = tokio::task::spawn_blocking(move || analytics::render_png(&scores))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn handle_stats_summary(State(service): State<Arc<QaService>>) -> Response {
    match service.history().summary() {
        Some(summary) => Json(summary).into_response(),
        None => not_enough_data(),
    }
}
