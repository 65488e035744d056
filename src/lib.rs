//! AI Detector Hub: image and text authenticity detection behind an HTTP API,
//! plus the Telegram bot that fronts it.

pub mod bot;
pub mod classifier;
pub mod client;
pub mod config;
pub mod detection_log;
pub mod logging;
pub mod server;
pub mod stats;
pub mod watermark;
