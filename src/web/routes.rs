//! HTTP routes for the web server
//!
//! Provides the health check, version and conversion endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{error, warn};

use super::form::SubmittedForm;
use super::shutdown::ShutdownCoordinator;
use crate::render::{ConversionRequest, Converter, ErrorKind, OutputFormat, RenderError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    pub fn new(converter: Converter, shutdown: ShutdownCoordinator) -> Self {
        Self {
            converter,
            shutdown,
        }
    }
}

/// Build the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(health_check).post(health_check))
        .route("/version", get(version).post(version))
        .route("/pdf", get(render_pdf).post(render_pdf))
        .route("/jpg", get(render_jpg).post(render_jpg))
}

/// Liveness probe, independent of the rendering binaries
async fn health_check() -> &'static str {
    "OK"
}

/// Version of the PDF rendering binary
async fn version(State(state): State<Arc<AppState>>) -> Result<Vec<u8>, AppError> {
    let _in_flight = state.shutdown.track();
    let stdout = state
        .converter
        .version(state.shutdown.wait_for_immediate())
        .await?;
    Ok(stdout)
}

async fn render_pdf(
    State(state): State<Arc<AppState>>,
    SubmittedForm(fields): SubmittedForm,
) -> Result<Response, AppError> {
    render(&state, ConversionRequest::new(OutputFormat::Pdf, fields)).await
}

async fn render_jpg(
    State(state): State<Arc<AppState>>,
    SubmittedForm(fields): SubmittedForm,
) -> Result<Response, AppError> {
    render(&state, ConversionRequest::new(OutputFormat::Jpg, fields)).await
}

async fn render(state: &AppState, request: ConversionRequest) -> Result<Response, AppError> {
    let _in_flight = state.shutdown.track();
    let bytes = state
        .converter
        .convert(&request, state.shutdown.wait_for_immediate())
        .await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, request.format.content_type())],
        bytes,
    )
        .into_response())
}

/// API error type
#[derive(Debug)]
pub enum AppError {
    /// Conversion or version failure
    Render(RenderError),
    /// Request body exceeded the configured limit
    PayloadTooLarge(String),
}

impl AppError {
    /// HTTP status for an error kind.
    ///
    /// Every failure is reported as `500`, including malformed requests.
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::InvalidRequest | ErrorKind::ResourceError | ErrorKind::ExecutionFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Render(err) => Self::status_for(err.kind()),
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Render(err) => err.fmt(f),
            AppError::PayloadTooLarge(message) => write!(f, "request body too large: {}", message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Render(err) => error!(kind = ?err.kind(), error = %err, "request failed"),
            AppError::PayloadTooLarge(_) => warn!(error = %self, "request rejected"),
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}
