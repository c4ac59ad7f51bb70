//! Chat boost tracking.
//!
//! Telegram pushes `chat_boost` / `removed_chat_boost` updates for chats where
//! the bot is an administrator. They are stored so the boost task can be
//! checked without an API call.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ChatBoostRemoved, ChatBoostSource, ChatBoostUpdated, User};
use tracing::{debug, info};

use crate::bot::dispatcher::AppState;
use crate::database::ChatBoostRecord;

pub fn handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_chat_boost().endpoint(boost_added))
        .branch(Update::filter_removed_chat_boost().endpoint(boost_removed))
}

/// The user behind a boost, when Telegram discloses one.
fn booster(source: &ChatBoostSource) -> Option<&User> {
    match source {
        ChatBoostSource::Premium(premium) => Some(&premium.user),
        ChatBoostSource::GiftCode(gift) => Some(&gift.user),
        ChatBoostSource::Giveaway(giveaway) => giveaway.user.as_ref(),
    }
}

async fn boost_added(update: ChatBoostUpdated, state: AppState) -> anyhow::Result<()> {
    let boost = &update.boost;
    let Some(user) = booster(&boost.source) else {
        debug!("Anonymous boost in chat {}", update.chat.id);
        return Ok(());
    };

    let record = ChatBoostRecord {
        user_id: user.id.0,
        chat_id: update.chat.id.0,
        boost_id: boost.boost_id.to_string(),
        add_date: boost.add_date.timestamp(),
        expiration_date: boost.expiration_date.timestamp(),
    };
    state.boosts.save(&record).await?;

    info!("User {} boosted chat {}", record.user_id, record.chat_id);
    Ok(())
}

async fn boost_removed(update: ChatBoostRemoved, state: AppState) -> anyhow::Result<()> {
    state
        .boosts
        .remove(update.chat.id.0, &update.boost_id.to_string())
        .await?;
    debug!("Boost {} removed from chat {}", update.boost_id, update.chat.id);
    Ok(())
}
