use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::error::ClassifyError;
use crate::service::InferenceService;

/// Multipart field the image is expected in.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no file field in the upload")]
    MissingFile,

    /// The request is not a usable multipart body.
    #[error(transparent)]
    Rejection(#[from] MultipartRejection),

    #[error("{}", multipart_message(.0))]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn multipart_message(e: &MultipartError) -> String {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        "upload exceeds the size limit".to_string()
    } else {
        e.body_text()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Every failure is reported as bad input, whatever its origin.
        let body = ErrorResponse {
            detail: format!("Error processing image: {self}"),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

pub fn router(service: Arc<InferenceService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict/", post(predict))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

async fn root() -> &'static str {
    "leaf disease classifier\n"
}

async fn predict(
    State(service): State<Arc<InferenceService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart).await?;
    let worker = service.clone();
    let classification = tokio::task::spawn_blocking(move || worker.predict(&upload)).await??;

    Ok(Json(PredictResponse {
        prediction: classification.label,
        confidence: service
            .reports_confidence()
            .then_some(classification.confidence),
    }))
}

/// Bytes of the `file` field, or of the first field that carries a file name.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.name() == Some(FILE_FIELD) || field.file_name().is_some();
        if is_file {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ApiError::MissingFile)
}

/// Serves until Ctrl-C.
pub async fn serve(service: Arc<InferenceService>, addr: SocketAddr, max_upload_bytes: usize) -> Result<()> {
    let app = router(service, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Binding {addr}"))?;
    info!("Leaf classifier listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
