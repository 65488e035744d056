use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    /// Directory for state files (logs, detection log, bot database). Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default)]
    server: ServerConfig,
    bot: Option<BotFile>,
}

/// HTTP service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Hugging Face repository of the ViT image classifier.
    pub image_model_repo: String,
    /// Hugging Face repository of the RoBERTa text classifier.
    pub text_model_repo: String,
    /// Token budget for text scoring; longer input is truncated.
    pub max_text_tokens: usize,
    /// Font candidates for the watermark, tried in order.
    pub font_paths: Vec<PathBuf>,
    /// Optional avatar composited next to the watermark caption.
    pub avatar_path: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            image_model_repo: "dima806/ai_vs_real_image_detection".to_string(),
            text_model_repo: "Hello-SimpleAI/chatgpt-detector-roberta".to_string(),
            max_text_tokens: 512,
            font_paths: vec![
                PathBuf::from("arial.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"),
            ],
            avatar_path: Some(PathBuf::from("face.png")),
            jpeg_quality: 95,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
struct BotFile {
    /// Falls back to the BOT_TOKEN environment variable when empty.
    telegram_bot_token: String,
    server_url: String,
    database_path: String,
    upload_timeout_secs: u64,
    text_timeout_secs: u64,
}

impl Default for BotFile {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            server_url: "http://127.0.0.1:8000".to_string(),
            database_path: "bot_data.db".to_string(),
            upload_timeout_secs: 60,
            text_timeout_secs: 30,
        }
    }
}

/// Chat client settings, validated.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    /// Base URL of the HTTP service, without a trailing slash.
    pub server_url: String,
    pub database_path: PathBuf,
    pub upload_timeout: Duration,
    pub text_timeout: Duration,
}

pub struct Config {
    /// Path the config was loaded from (may not exist when defaults are used).
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub server: ServerConfig,
    bot: Option<BotFile>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;
        Self::from_file(config_path, file)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Self::from_file(path.as_ref().to_path_buf(), ConfigFile::default())
        }
    }

    fn from_file(config_path: PathBuf, file: ConfigFile) -> Result<Self, ConfigError> {
        let server = file.server;
        if !(1..=100).contains(&server.jpeg_quality) {
            return Err(ConfigError::Validation("server.jpeg_quality must be between 1 and 100".into()));
        }
        if server.max_text_tokens == 0 {
            return Err(ConfigError::Validation("server.max_text_tokens must be positive".into()));
        }
        if server.max_upload_bytes == 0 {
            return Err(ConfigError::Validation("server.max_upload_bytes must be positive".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path,
            data_dir,
            server,
            bot: file.bot,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn detection_log_path(&self) -> PathBuf {
        self.data_dir.join("uploads").join("detections.json")
    }

    /// Validated bot settings. The token comes from the config file or BOT_TOKEN.
    pub fn bot(&self) -> Result<BotConfig, ConfigError> {
        let file = self.bot.clone().unwrap_or_default();

        let token = if file.telegram_bot_token.is_empty() {
            std::env::var("BOT_TOKEN").unwrap_or_default()
        } else {
            file.telegram_bot_token
        };
        validate_token(&token)?;

        let server_url = file.server_url.trim_end_matches('/').to_string();
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "bot.server_url must be an http(s) URL, got '{server_url}'"
            )));
        }

        Ok(BotConfig {
            telegram_bot_token: token,
            server_url,
            database_path: self.data_dir.join(file.database_path),
            upload_timeout: Duration::from_secs(file.upload_timeout_secs),
            text_timeout: Duration::from_secs(file.text_timeout_secs),
        })
    }
}

/// Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric.
pub fn validate_token(token: &str) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram_bot_token is required (config file or BOT_TOKEN)".into(),
        ));
    }
    let token_parts: Vec<&str> = token.split(':').collect();
    if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
        return Err(ConfigError::Validation(
            "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
        ));
    }
    Ok(())
}
