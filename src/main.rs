use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use detector_hub::classifier::{RobertaTextClassifier, TextDetector, VitImageClassifier};
use detector_hub::config::Config;
use detector_hub::detection_log::DetectionLog;
use detector_hub::logging;
use detector_hub::server::{self, AppState};
use detector_hub::watermark::Watermarker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "detector.json".to_string());
    let config = Config::load_or_default(&config_path)?;

    let _guard = logging::init(&config.log_dir(), "detector-hub.log").context("Failed to open log file")?;

    info!("🚀 Starting detector-hub...");
    if config.config_path.exists() {
        info!("Loaded config from {config_path}");
    } else {
        info!("No config at {config_path}, using defaults");
    }

    let server_cfg = config.server.clone();

    // Model downloads and weight loading block for a while on first start
    let image_repo = server_cfg.image_model_repo.clone();
    let image_classifier = tokio::task::spawn_blocking(move || VitImageClassifier::load(&image_repo)).await?;
    let text_repo = server_cfg.text_model_repo.clone();
    let max_tokens = server_cfg.max_text_tokens;
    let text_classifier =
        tokio::task::spawn_blocking(move || RobertaTextClassifier::load(&text_repo, max_tokens)).await?;

    if !image_classifier.is_ready() {
        warn!("Image model unavailable, uploads will get neutral scores");
    }
    if !text_classifier.is_ready() {
        warn!("Text model unavailable, text detection will report errors");
    }

    let watermarker = Watermarker::from_paths(&server_cfg.font_paths, server_cfg.avatar_path.as_deref());
    let detection_log = DetectionLog::spawn(config.detection_log_path());
    info!("Detection log: {}", detection_log.path().display());

    let state = AppState {
        image_classifier: Arc::new(image_classifier),
        text_detector: Arc::new(TextDetector::new(Arc::new(text_classifier))),
        watermarker: Arc::new(watermarker),
        detection_log,
        jpeg_quality: server_cfg.jpeg_quality,
        max_upload_bytes: server_cfg.max_upload_bytes,
    };

    let address = server_cfg.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("🌐 Listening on http://{address}");

    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
