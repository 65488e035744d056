//! HTTP client the bot uses to reach the detection service.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct DetectorClient {
    base_url: String,
    http: reqwest::Client,
    upload_timeout: Duration,
    text_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDetection {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub real_probability: f32,
    #[serde(default)]
    pub ai_probability: f32,
    #[serde(default)]
    pub watermark: String,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDetection {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub ai_score: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

impl DetectorClient {
    pub fn new(base_url: impl Into<String>, upload_timeout: Duration, text_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            upload_timeout,
            text_timeout,
        }
    }

    /// Send a photo to `/upload` as a JPEG multipart field.
    pub async fn upload_image(&self, image: Vec<u8>) -> Result<ImageDetection, Error> {
        debug!("Uploading {} bytes for analysis", image.len());
        let part = Part::bytes(image)
            .file_name("img.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Http(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Self::parse(response).await
    }

    pub async fn detect_text(&self, text: &str) -> Result<TextDetection, Error> {
        let response = self
            .http
            .post(format!("{}/detect-text", self.base_url))
            .json(&TextRequest { text })
            .timeout(self.text_timeout)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Self::parse(response).await
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, Error> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }
}

#[derive(Debug)]
pub enum Error {
    /// Connection failure or timeout.
    Http(String),
    /// The service answered with a non-2xx status.
    Status(u16),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status(code) => write!(f, "server returned status {code}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
