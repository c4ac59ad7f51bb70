//! Webhook mode implementation for the bot.
//!
//! Registers the webhook with Telegram (including the update types we
//! subscribe to), serves teloxide's axum route next to a `/health` route and
//! deletes the webhook again on shutdown.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::get;
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::dispatcher::ThrottledBot;
use crate::config::Config;

/// Update types the handler tree consumes. Telegram only delivers chat boost
/// updates when they are listed explicitly.
pub fn allowed_updates() -> Vec<AllowedUpdate> {
    vec![
        AllowedUpdate::Message,
        AllowedUpdate::CallbackQuery,
        AllowedUpdate::ChatBoost,
        AllowedUpdate::RemovedChatBoost,
    ]
}

/// Start the bot in webhook mode and block until shutdown.
pub async fn start_webhook(
    config: &Config,
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
    bot: ThrottledBot,
) -> Result<()> {
    let webhook_url = config
        .webhook_url
        .as_deref()
        .context("WEBHOOK_URL must be set when using webhook mode")?;
    let url = Url::parse(webhook_url).context("Invalid WEBHOOK_URL format")?;

    // Listen on all interfaces at the configured port
    let address = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    let secret = match config.webhook_secret.clone() {
        Some(secret) => {
            info!("Webhook secret token configured");
            secret
        }
        None => Uuid::new_v4().simple().to_string(),
    };
    let options = Options::new(address, url.clone()).secret_token(secret.clone());

    info!("🔗 Setting webhook URL: {}", url);

    // The webhook setup only needs basic API access, so the inner Bot is used.
    let api = bot.inner().clone();
    api.set_webhook(url)
        .secret_token(secret)
        .allowed_updates(allowed_updates())
        .await
        .context("Failed to set up webhook")?;

    let (listener, stop_flag, router) = webhooks::axum_no_setup(options);
    let shutdown = async move {
        stop_flag.await;
        if let Err(e) = api.delete_webhook().await {
            warn!("Couldn't delete webhook: {}", e);
        }
    };

    let app = router.route("/health", get(|| async { "ok" }));
    let tcp = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Cannot bind {}", address))?;
    info!("📡 Listening on: {}", address);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(shutdown).await {
            error!("Webhook server error: {}", e);
        }
    });

    info!("✅ Webhook setup complete, waiting for updates...");

    let error_handler = LoggingErrorHandler::with_custom_text("Error from update listener");
    dispatcher.dispatch_with_listener(listener, error_handler).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boost_updates_are_requested() {
        let updates = allowed_updates();
        assert!(updates.contains(&AllowedUpdate::ChatBoost));
        assert!(updates.contains(&AllowedUpdate::RemovedChatBoost));
        assert!(updates.contains(&AllowedUpdate::CallbackQuery));
    }
}
