//! Channel membership and chat boost lookups.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, UserId};
use tracing::debug;

use crate::bot::dispatcher::ThrottledBot;
use crate::cache::{CacheConfig, TypedCache};
use crate::database::BoostRepository;

#[async_trait]
pub trait MembershipChecker: Send + Sync {
    /// Member, administrator or owner of the chat.
    async fn is_member(&self, chat_id: i64, user_id: u64) -> Result<bool>;

    /// Holds at least one unexpired boost of the chat.
    async fn has_boost(&self, chat_id: i64, user_id: u64) -> Result<bool>;
}

/// Cache key for membership lookups.
type MemberCacheKey = (i64, u64); // (chat_id, user_id)

/// Telegram-backed checker.
///
/// Only positive membership answers are cached, so a user who just joined is
/// never told they are missing for longer than one request.
pub struct TelegramMembership {
    bot: ThrottledBot,
    boosts: Arc<BoostRepository>,
    cache: TypedCache<MemberCacheKey, ()>,
}

impl TelegramMembership {
    pub fn new(bot: ThrottledBot, boosts: Arc<BoostRepository>) -> Self {
        let cache = TypedCache::new(
            "channel_members",
            CacheConfig::with_capacity(20_000).ttl(Duration::from_secs(30)),
        );
        Self { bot, boosts, cache }
    }
}

#[async_trait]
impl MembershipChecker for TelegramMembership {
    async fn is_member(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let key = (chat_id, user_id);
        if self.cache.contains(&key) {
            return Ok(true);
        }

        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await?;

        let subscribed = match &member.kind {
            ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) => true,
            kind => kind.is_member(),
        };

        debug!("User {} in chat {}: subscribed={}", user_id, chat_id, subscribed);
        if subscribed {
            self.cache.insert(key, ());
        }
        Ok(subscribed)
    }

    async fn has_boost(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        if self.boosts.has_active(user_id, chat_id).await? {
            return Ok(true);
        }

        // Boosts made before the bot started listening are only visible here.
        let boosts = self
            .bot
            .get_user_chat_boosts(ChatId(chat_id), UserId(user_id))
            .await?;
        let now = chrono::Utc::now();
        Ok(boosts.boosts.iter().any(|b| b.expiration_date > now))
    }
}
