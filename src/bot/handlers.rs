use std::sync::Arc;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId, ParseMode, PhotoSize};
use tracing::{info, warn};

use super::BotState;
use super::menu::{self, PhotoOutcome, TextRoute};

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if let Some(photos) = msg.photo() {
        return handle_photo(&bot, &msg, photos, &state).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64);

    match menu::route_text(text) {
        TextRoute::Start => {
            bot.send_message(msg.chat.id, menu::GREETING)
                .parse_mode(ParseMode::Html)
                .reply_markup(menu::keyboard())
                .await?;
        }
        TextRoute::CheckTextHint => {
            bot.send_message(msg.chat.id, menu::CHECK_TEXT_HINT).await?;
        }
        TextRoute::Profile => {
            let Some(user_id) = user_id else {
                return Ok(());
            };
            let checks = state.stats.user_checks(user_id).unwrap_or_else(|e| {
                warn!("Failed to read stats for user {user_id}: {e}");
                0
            });
            bot.send_message(msg.chat.id, menu::profile_text(user_id, checks))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        TextRoute::GlobalStats => {
            let total = state.stats.total_checks().unwrap_or_else(|e| {
                warn!("Failed to read global stats: {e}");
                0
            });
            bot.send_message(msg.chat.id, menu::global_stats_text(total))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        TextRoute::Ignore => {}
        TextRoute::TooShort => {
            bot.send_message(msg.chat.id, menu::TEXT_TOO_SHORT).await?;
        }
        TextRoute::Detect => {
            handle_text(&bot, &msg, text, user_id, &state).await?;
        }
    }

    Ok(())
}

async fn handle_text(
    bot: &Bot,
    msg: &Message,
    text: &str,
    user_id: Option<i64>,
    state: &BotState,
) -> ResponseResult<()> {
    let status = bot.send_message(msg.chat.id, "⏳ Reading the text...").await?;

    let result = state.client.detect_text(text).await;
    match &result {
        Ok(detection) => info!("📝 Text from {:?}: {} ({}%)", user_id, detection.label, detection.ai_score),
        Err(e) => warn!("Text detection request failed: {e}"),
    }

    let outcome = menu::text_outcome(&result);
    if outcome.counts_check {
        state.record_check(user_id);
    }
    edit_status(bot, msg, status.id, outcome.reply).await
}

async fn handle_photo(bot: &Bot, msg: &Message, photos: &[PhotoSize], state: &BotState) -> ResponseResult<()> {
    let Some(largest) = photos.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)) else {
        return Ok(());
    };
    let status = bot.send_message(msg.chat.id, "⏳ Analyzing the photo...").await?;

    let photo = match download(bot, largest.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("{e}");
            return edit_status(bot, msg, status.id, "❌ Could not download the photo.".to_string()).await;
        }
    };
    info!("📥 Downloaded photo ({} bytes)", photo.len());

    let result = state.client.upload_image(photo).await;
    if let Err(e) = &result {
        warn!("Image upload failed: {e}");
    }

    let outcome = menu::photo_outcome(&result);
    if outcome.counts_check() {
        state.record_check(msg.from.as_ref().map(|u| u.id.0 as i64));
    }
    match outcome {
        PhotoOutcome::Annotated { image, caption } => {
            bot.send_photo(msg.chat.id, InputFile::memory(image).file_name("result.jpg"))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?;
            bot.delete_message(msg.chat.id, status.id).await.ok();
            Ok(())
        }
        PhotoOutcome::Failed(reply) => edit_status(bot, msg, status.id, reply).await,
    }
}

async fn download(bot: &Bot, file_id: FileId) -> Result<Vec<u8>, String> {
    let file = bot
        .get_file(file_id)
        .await
        .map_err(|e| format!("Failed to get file info: {e}"))?;

    let mut data = Vec::new();
    bot.download_file(&file.path, &mut data)
        .await
        .map_err(|e| format!("Failed to download file: {e}"))?;
    Ok(data)
}

async fn edit_status(bot: &Bot, msg: &Message, status_id: MessageId, text: String) -> ResponseResult<()> {
    bot.edit_message_text(msg.chat.id, status_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
