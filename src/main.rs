//! Bonusbot - Telegram referral and rewards bot
//!
//! Users earn bonus points by inviting friends and completing tasks; admins
//! get analytics, a paged user list and a broadcast composer.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB models and repositories
//! - `cache` - TTL caches with Moka
//! - `services` - Ledger seam, task engine, referral flow, membership checks
//! - `broadcast` - Campaign workers, pacing and delivery tracking
//! - `bot` - Dispatcher, shared state and runtime (with Throttle for API rate limiting)
//! - `plugins` - Command and callback handlers
//! - `events` - Flood guard and chat boost updates
//! - `i18n` - Embedded translations
//! - `utils` - Keyboards and text helpers

mod bot;
mod broadcast;
mod cache;
mod config;
mod database;
mod events;
mod i18n;
mod plugins;
mod services;
mod utils;

use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bot::{AppState, ThrottledBot};
use config::Config;
use database::Database;
use i18n::{ADMIN_LANGUAGE, get_text, t};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bonusbot=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting bonusbot...");

    let config = Arc::new(Config::from_env().context("Invalid configuration")?);
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);

    i18n::init();

    // Initialize bot with Throttle for automatic rate limiting
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    let me = bot.get_me().await.context("getMe failed")?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if config.admin_ids.is_empty() {
        warn!("No admin IDs configured (ADMIN_IDS is empty)");
    } else {
        info!("Bot admins: {:?}", config.admin_ids);
    }

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let db = match Database::connect(&config.mongodb_uri, &config.mongodb_database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Database connection failed: {:#}", e);
            let text = t(ADMIN_LANGUAGE, "admin.startup_failed", &[("error", &e.to_string())]);
            notify_admins(&bot, &config.admin_ids, &text).await;
            return Err(e.context("Database connection failed"));
        }
    };

    let state = AppState::new(bot.clone(), &db, config.clone(), bot_username);
    if let Err(e) = state.broadcast.resume(&state.campaigns).await {
        warn!("Cannot resume queued campaigns: {}", e);
    }

    let dispatcher = bot::build_dispatcher(bot.clone(), state);
    let outcome = bot::run(&config, bot.clone(), dispatcher).await;

    info!("Shutting down...");
    notify_admins(&bot, &config.admin_ids, &get_text(ADMIN_LANGUAGE, "admin.shutdown")).await;
    db.shutdown().await;

    outcome
}

/// Best-effort operational message to every admin.
async fn notify_admins(bot: &ThrottledBot, admin_ids: &[u64], text: &str) {
    for &admin in admin_ids {
        if let Err(e) = bot.send_message(ChatId(admin as i64), text).await {
            warn!("Failed to notify admin {}: {}", admin, e);
        }
    }
}
