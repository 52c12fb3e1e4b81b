//! HTTP boundary: `POST /predict` and `GET /health`.
//!
//! The only place where [`PipelineError`]s become status codes.

mod request;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use preservion_ai::Pipeline;
use preservion_core::{Assessment, Condition, PipelineError};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use request::parse_reading;

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Request failure rendered as `{"error": ..}` with a matching status.
pub enum ApiError {
    Pipeline(PipelineError),
    /// The body could not be read (too large, aborted upload).
    Body(BytesRejection),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(PipelineError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::ModelUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(PipelineError::EncodingMismatch { .. })
            | Self::Pipeline(PipelineError::ModelOutput(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Pipeline(err) => err.to_string(),
            Self::Body(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_client_error() {
            warn!(%status, error = %message, "rejected request");
        } else {
            error!(%status, error = %message, "assessment failed");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model: &'static str,
    artifact_version: String,
    onion_types: Vec<String>,
    classes: Vec<Condition>,
    started_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        version = %state.pipeline.version(),
        "serving spoilage assessments"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Assessment>, ApiError> {
    let reading = parse_reading(&body?)?;
    let assessment = state.pipeline.assess(&reading)?;
    Ok(Json(assessment))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pipeline = &state.pipeline;
    let ready = pipeline.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if ready { "ok" } else { "unavailable" },
        model_loaded: ready,
        model: pipeline.model_kind(),
        artifact_version: pipeline.version().to_string(),
        onion_types: pipeline.onion_types().to_vec(),
        classes: pipeline.classes().to_vec(),
        started_at: state.started_at.to_rfc3339(),
    };
    (status, Json(body))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
