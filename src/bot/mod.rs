//! Telegram front-end: forwards photos and text to the detection service and
//! keeps the usage counters.

pub mod handlers;
pub mod menu;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use crate::client::DetectorClient;
use crate::stats::Stats;

pub struct BotState {
    pub client: DetectorClient,
    pub stats: Stats,
}

impl BotState {
    pub fn new(client: DetectorClient, stats: Stats) -> Self {
        Self { client, stats }
    }

    /// Count a successful check. Counter failures never fail the reply.
    pub fn record_check(&self, user_id: Option<i64>) {
        let Some(user_id) = user_id else {
            return;
        };
        if let Err(e) = self.stats.record_check(user_id) {
            warn!("Failed to update stats for user {user_id}: {e}");
        }
    }
}

/// Run the long-polling dispatcher until Ctrl-C.
pub async fn run(bot: Bot, state: Arc<BotState>) {
    match bot.get_me().await {
        Ok(me) => info!("Bot user ID: {}, username: @{}", me.id, me.username()),
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
