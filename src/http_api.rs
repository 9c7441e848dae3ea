/// HTTP surface of the classification service
///
/// Endpoints:
/// - `GET /health`: loaded model summary
/// - `POST /classify`: CSV body with `source` and `log_message` columns,
///   answered with the same CSV plus `target_label`
use crate::cascade::ClassificationCascade;
use crate::error::{ClassifierError, ErrorKind};
use crate::records::LogTable;
use crate::serving::classify_table;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const CSV_CONTENT_TYPES: [&str; 2] = ["text/csv", "application/csv"];

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    cascade: Arc<ClassificationCascade>,
}

impl AppState {
    pub fn new(cascade: Arc<ClassificationCascade>) -> Self {
        Self { cascade }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/classify", post(classify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    classes: Vec<String>,
    embedding_dimension: usize,
    embedder: String,
    regex_rules: usize,
    oracle: String,
    oracle_sources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Maps a classifier error onto an HTTP status
pub struct ApiError(ClassifierError);

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match (&self.0, self.0.kind()) {
            (_, ErrorKind::Service) => StatusCode::SERVICE_UNAVAILABLE,
            (ClassifierError::InvalidData(_) | ClassifierError::Csv(_), _) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(component = "http_api", status = status.as_u16(), "{}", self.0);
        } else {
            tracing::warn!(component = "http_api", status = status.as_u16(), "{}", self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cascade = &state.cascade;
    Json(HealthResponse {
        status: "healthy",
        classes: cascade.model().classes().to_vec(),
        embedding_dimension: cascade.model().dimension(),
        embedder: cascade.embedder_name().to_string(),
        regex_rules: cascade.rules().len(),
        oracle: cascade.oracle_name().to_string(),
        oracle_sources: cascade
            .routing()
            .oracle_sources()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

async fn classify(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if !CSV_CONTENT_TYPES.contains(&mime.as_str()) {
        return Err(ClassifierError::InvalidData(format!(
            "expected a CSV upload (text/csv), got '{content_type}'"
        ))
        .into());
    }

    let table = LogTable::from_reader(body.as_ref())?;
    let rows = table.len();
    let classified = classify_table(&state.cascade, table).await?;

    let mut out = Vec::new();
    classified.write_to(&mut out)?;
    tracing::info!(component = "http_api", rows, "classified upload");

    Ok(([(header::CONTENT_TYPE, "text/csv")], out).into_response())
}
