use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::Html,
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{AppError, AppState, now_iso};
use crate::classifier::{ERROR_LABEL, ImageClassifier};
use crate::detection_log::Detection;
use crate::watermark::Watermarker;

pub const CAPTION_PASSED: &str = "Passed the AI check";
pub const CAPTION_FAILED: &str = "Failed the AI check";

const UI_PAGE: &str = include_str!("../../static/index.html");

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "AI Detector Hub API is running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "online", "time": now_iso() }))
}

pub async fn ui() -> Html<&'static str> {
    Html(UI_PAGE)
}

/// `POST /upload`: classify an image and return it watermarked.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Detection>, AppError> {
    let bytes = read_image_field(&mut multipart).await?;
    info!("📷 Analyzing uploaded image ({} bytes)", bytes.len());

    let classifier = state.image_classifier.clone();
    let watermarker = state.watermarker.clone();
    let quality = state.jpeg_quality;
    let detection = tokio::task::spawn_blocking(move || {
        analyze_image(classifier.as_ref(), &watermarker, &bytes, quality)
    })
    .await??;

    if let Err(e) = state.detection_log.append(detection.clone()).await {
        warn!("Failed to log image detection: {e}");
    }
    Ok(Json(detection))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("malformed multipart body", e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::InvalidInput(format!(
                "only image uploads (JPG, PNG, ...) are accepted, got '{content_type}'"
            )));
        }
        return field
            .bytes()
            .await
            .map_err(|e| multipart_error("failed to read upload", e));
    }
    Err(AppError::InvalidInput("missing multipart field 'file'".to_string()))
}

fn multipart_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge(format!("{context}: {e}"))
    } else {
        AppError::InvalidInput(format!("{context}: {e}"))
    }
}

/// Decode, classify, watermark and encode one upload. Blocking.
pub fn analyze_image(
    classifier: &dyn ImageClassifier,
    watermarker: &Watermarker,
    bytes: &[u8],
    jpeg_quality: u8,
) -> Result<Detection, AppError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| AppError::InvalidInput(format!("not a decodable image: {e}")))?
        .to_rgb8();

    let scores = classifier.predict(&image);
    let caption = if scores.is_real() { CAPTION_PASSED } else { CAPTION_FAILED };
    let marked = watermarker.apply(&image, caption);
    let jpeg = encode_jpeg(&marked, jpeg_quality)
        .map_err(|e| AppError::Processing(format!("failed to encode result: {e}")))?;

    info!(
        "Image verdict: real {:.1}%, ai {:.1}% ({})",
        scores.real_probability * 100.0,
        scores.ai_probability * 100.0,
        scores.label
    );

    Ok(Detection::Image {
        success: true,
        real_probability: scores.real_probability,
        ai_probability: scores.ai_probability,
        watermark: caption.to_string(),
        image_base64: BASE64.encode(jpeg),
    })
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
    Ok(buf)
}

#[derive(Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// `POST /detect-text`. Model failures come back as `success: false`, not as an HTTP error.
pub async fn detect_text(State(state): State<AppState>, Json(request): Json<TextRequest>) -> Json<Detection> {
    let detector = state.text_detector.clone();
    let chars = request.text.chars().count();
    let outcome = tokio::task::spawn_blocking(move || detector.detect(&request.text)).await;

    let verdict = match outcome {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            warn!("❌ Text analysis failed: {e:#}");
            return Json(failed_text_detection());
        }
        Err(e) => {
            warn!("❌ Text analysis task failed: {e}");
            return Json(failed_text_detection());
        }
    };

    info!("📝 Text verdict for {chars} chars: {} ({}%)", verdict.verdict.label(), verdict.score);
    let detection = Detection::Text {
        success: true,
        ai_score: verdict.score,
        label: verdict.verdict.label().to_string(),
    };
    if let Err(e) = state.detection_log.append(detection.clone()).await {
        warn!("Failed to log text detection: {e}");
    }
    Json(detection)
}

fn failed_text_detection() -> Detection {
    Detection::Text {
        success: false,
        ai_score: 0.0,
        label: ERROR_LABEL.to_string(),
    }
}
