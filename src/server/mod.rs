//! HTTP service: image and text detection endpoints.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::classifier::{ImageClassifier, TextDetector};
use crate::detection_log::DetectionLog;
use crate::watermark::Watermarker;

pub use error::AppError;

/// Shared state handed to every handler. Adapters are built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub image_classifier: Arc<dyn ImageClassifier>,
    pub text_detector: Arc<TextDetector>,
    pub watermarker: Arc<Watermarker>,
    pub detection_log: DetectionLog,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/ui", get(routes::ui))
        .route("/upload", post(routes::upload_image))
        .route("/detect-text", post(routes::detect_text))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Local wall-clock time in ISO-8601 without offset, e.g. `2026-10-19T14:03:07.123456`.
pub fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
