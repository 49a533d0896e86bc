use crate::config::Config;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tesseract_runner::{OcrError, OptionOverrides, TesseractRunner};
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<TesseractRunner>,
    pub config: Arc<Config>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Ocr(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.code()),
            ApiError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            ApiError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub processing_time_ms: u64,
    pub language: Option<String>,
    pub page_segmentation_mode: Option<u32>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub binary: String,
    pub default_language: Option<String>,
    pub default_page_segmentation_mode: Option<u32>,
    pub max_file_size_bytes: usize,
    pub pending_outputs: usize,
}

/// Run the HTTP server until SIGINT/SIGTERM, then sweep pending outputs
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        runner: Arc::new(TesseractRunner::new()),
        config: Arc::new(config),
    };
    let runner = state.runner.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    finish(&runner, served)
}

/// Sweep pending outputs whether or not serving failed
fn finish(runner: &TesseractRunner, served: std::io::Result<()>) -> anyhow::Result<()> {
    runner.shutdown();

    match &served {
        Ok(()) => tracing::info!("Server stopped"),
        Err(e) => tracing::error!("Server failed: {}", e),
    }

    served.map_err(Into::into)
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/ocr", post(handle_ocr))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut overrides = OptionOverrides::default();
    let mut languages: Option<String> = None;
    let mut psm: Option<u32> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?);
            }
            "languages" => {
                languages =
                    Some(field.text().await.map_err(|e| {
                        ApiError::InvalidRequest(format!("Invalid languages: {}", e))
                    })?);
            }
            "psm" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid psm: {}", e)))?;
                psm = Some(raw.trim().parse().map_err(|_| {
                    ApiError::InvalidRequest(format!("Invalid psm: {:?}", raw))
                })?);
            }
            "options" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid options: {}", e)))?;
                overrides = OptionOverrides::from_json(&raw)
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid options: {}", e)))?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    // Clients must not choose what gets executed
    if overrides.binary_path.is_some() || overrides.env.is_some() {
        return Err(ApiError::InvalidRequest(
            "binaryPath and env cannot be set per request".to_string(),
        ));
    }

    if let Some(languages) = languages.filter(|l| !l.trim().is_empty()) {
        overrides.language = Some(Some(languages.trim().to_string()));
    }
    if let Some(psm) = psm {
        overrides.page_segmentation_mode = Some(Some(psm));
    }

    // Validate file was provided
    let data = file_data.ok_or(ApiError::MissingFile)?;

    // Check file size
    if data.len() > state.config.max_file_size {
        return Err(ApiError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let mime = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    // Tesseract sniffs the format, but a matching extension keeps leptonica happy
    let extension = match mime.as_str() {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/webp" => ".webp",
        "image/tiff" => ".tiff",
        _ => {
            tracing::warn!("Received file with content type: {}", mime);
            ".tmp"
        }
    };

    // Write to temp file with proper extension
    let mut temp_file = tempfile::Builder::new()
        .prefix("tesseract-runner-upload-")
        .suffix(extension)
        .tempfile()
        .map_err(|e| ApiError::Internal(format!("Failed to create temp file: {}", e)))?;

    temp_file
        .write_all(&data)
        .and_then(|_| temp_file.flush())
        .map_err(|e| ApiError::Internal(format!("Failed to write temp file: {}", e)))?;

    let options = state.config.defaults.clone().merge(overrides);
    let text = state.runner.recognize(temp_file.path(), &options).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "OCR completed in {}ms, text length: {}",
        processing_time_ms,
        text.len()
    );

    Ok(Json(OcrResponse {
        text,
        processing_time_ms,
        language: options.language,
        page_segmentation_mode: options.page_segmentation_mode,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let defaults = &state.config.defaults;

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        binary: defaults.binary_path.clone(),
        default_language: defaults.language.clone(),
        default_page_segmentation_mode: defaults.page_segmentation_mode,
        max_file_size_bytes: state.config.max_file_size,
        pending_outputs: state.runner.pending().len(),
    })
}
