use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use tracing::info;

use detector_hub::bot::{self, BotState};
use detector_hub::client::DetectorClient;
use detector_hub::config::Config;
use detector_hub::logging;
use detector_hub::stats::Stats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "detector.json".to_string());
    let config = Config::load_or_default(&config_path)?;
    let bot_config = config.bot()?;

    let _guard = logging::init(&config.log_dir(), "detector-bot.log").context("Failed to open log file")?;

    info!("🚀 Starting detector-bot...");
    info!("Detection service: {}", bot_config.server_url);

    let stats = Stats::open(&bot_config.database_path)
        .with_context(|| format!("Failed to open {}", bot_config.database_path.display()))?;
    let client = DetectorClient::new(
        bot_config.server_url.clone(),
        bot_config.upload_timeout,
        bot_config.text_timeout,
    );

    let bot = Bot::new(&bot_config.telegram_bot_token);
    let state = Arc::new(BotState::new(client, stats));
    bot::run(bot, state).await;

    info!("Bot stopped");
    Ok(())
}
