//! Bot runtime - Polling and Webhook runners.

use tracing::info;

use super::dispatcher::ThrottledBot;
use super::webhook::start_webhook;
use crate::config::{BotMode, Config};

/// Run the bot with the configured mode until shutdown (Ctrl+C).
pub async fn run(
    config: &Config,
    bot: ThrottledBot,
    mut dispatcher: teloxide::dispatching::Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
) -> anyhow::Result<()> {
    match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            dispatcher.dispatch().await;
            Ok(())
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            start_webhook(config, dispatcher, bot).await
        }
    }
}
