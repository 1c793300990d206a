//! HTTP surface of the predictor service.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::classifier::ClassifierError;
use crate::config::ServeConfig;
use crate::predictor::{TopicPrediction, TopicPredictor, DEFAULT_TOP_K};

/// Read-only context shared by every request.
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    predictor: Option<Arc<TopicPredictor>>,
}

impl ServiceState {
    pub fn loaded(predictor: Arc<TopicPredictor>) -> Self {
        Self { predictor: Some(predictor) }
    }

    pub fn unloaded() -> Self {
        Self { predictor: None }
    }

    pub fn models_loaded(&self) -> bool {
        self.predictor.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<TopicPrediction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}

/// Request failure, rendered as `{"error": ...}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ValidationError(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Routes at the root and again under `/api`.
pub fn router(state: ServiceState) -> Router {
    let routes = Router::new()
        .route("/predict-topics", post(predict_topics))
        .route("/health", get(health));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn predict_topics(
    State(state): State<ServiceState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let predictor = state
        .predictor
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Models not loaded".into()))?;

    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let text = match request.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(ApiError::Validation("No text provided".into())),
    };
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);

    let predictions = tokio::task::spawn_blocking(move || predictor.predict(&text, top_k))
        .await
        .map_err(|e| ApiError::Internal(format!("Prediction task failed: {}", e)))?
        .map_err(|e| {
            let err = ApiError::from(e);
            match &err {
                ApiError::Validation(msg) => warn!("Rejected prediction request: {}", msg),
                _ => error!("Prediction failed: {}", err),
            }
            err
        })?;

    debug!("Returning {} predictions", predictions.len());
    Ok(Json(PredictResponse { predictions }))
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: state.models_loaded(),
    })
}

/// Binds `config.address()` and serves until `shutdown` resolves.
pub async fn serve<F>(config: &ServeConfig, state: ServiceState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.address();
    let listener = TcpListener::bind(&address).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", address, e);
        e
    })?;
    serve_on(listener, state, shutdown).await
}

/// Serves on an already bound listener.
pub async fn serve_on<F>(listener: TcpListener, state: ServiceState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Predictor service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Predictor service stopped");
    Ok(())
}
