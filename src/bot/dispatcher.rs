//! Message dispatcher setup.
//!
//! Builds the shared state and the handler tree: private messages pass the
//! flood guard before reaching commands or the campaign composer; callbacks
//! and chat boost updates have their own branches.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::User;

use crate::broadcast::{BroadcastContext, BroadcastQueue, TelegramSender};
use crate::cache::{CacheConfig, TypedCache};
use crate::config::Config;
use crate::database::{
    BoostRepository, CampaignRepository, Database, DeliveryRepository, Language, SettingsRepository,
    SubscriptionRepository, UserRepo,
};
use crate::events::{self, FloodGuard, flood_gate};
use crate::plugins::{self, Composer};
use crate::services::{MembershipChecker, ReferralService, TaskEngine, TaskRules, TelegramMembership};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub users: Arc<UserRepo>,
    pub campaigns: Arc<CampaignRepository>,
    pub boosts: Arc<BoostRepository>,
    pub subscriptions: Arc<SubscriptionRepository>,
    pub settings: Arc<SettingsRepository>,

    /// Channel membership lookups (cached).
    pub membership: Arc<dyn MembershipChecker>,
    pub tasks: Arc<TaskEngine>,
    pub referrals: Arc<ReferralService>,

    /// Hands confirmed campaigns to the broadcast workers.
    pub broadcast: BroadcastQueue,

    /// Per-admin campaign drafts.
    pub composer: Composer,

    /// Referral codes of visitors still outside the main channel.
    pub pending_referrals: TypedCache<u64, String>,

    /// Bot username (without @) for referral links.
    pub bot_username: String,
}

impl AppState {
    /// Build repositories and services, and start the broadcast workers.
    pub fn new(bot: ThrottledBot, db: &Database, config: Arc<Config>, bot_username: String) -> Self {
        let users = Arc::new(UserRepo::new(db));
        let campaigns = Arc::new(CampaignRepository::new(db));
        let boosts = Arc::new(BoostRepository::new(db));
        let subscriptions = Arc::new(SubscriptionRepository::new(db));
        let settings = Arc::new(SettingsRepository::new(db));

        let membership: Arc<dyn MembershipChecker> =
            Arc::new(TelegramMembership::new(bot.clone(), boosts.clone()));

        let rules = TaskRules {
            name_marker: config.name_marker.clone(),
            channels: config.channels.iter().map(|c| c.chat_id).collect(),
            boost_chat_id: config.boost_chat_id,
        };
        let tasks = Arc::new(TaskEngine::new(users.clone(), membership.clone(), rules));
        let referrals = Arc::new(ReferralService::new(users.clone()));

        let context = Arc::new(BroadcastContext {
            sender: Arc::new(TelegramSender::new(bot.inner().clone())),
            store: Arc::new(DeliveryRepository::new(db)),
            campaigns: campaigns.clone(),
            users: users.clone(),
            admin_ids: config.admin_ids.clone(),
            config: config.broadcast.clone(),
        });
        let broadcast = BroadcastQueue::start(context, config.broadcast.workers);

        Self {
            config,
            users,
            campaigns,
            boosts,
            subscriptions,
            settings,
            membership,
            tasks,
            referrals,
            broadcast,
            composer: Composer::default(),
            pending_referrals: TypedCache::new("pending_referrals", CacheConfig::pending_referral()),
            bot_username,
        }
    }

    /// Check if a user is a configured administrator.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.config.admin_ids.contains(&user_id)
    }

    /// Stored interface language, `None` for unknown users or lookup errors.
    pub async fn user_language(&self, user_id: u64) -> Option<Language> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => user.and_then(|u| u.language),
            Err(e) => {
                tracing::warn!("Language lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Referral link shown on the referral screen.
    pub fn referral_link(&self, code: &str) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, code)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    let flood_guard = FloodGuard::new(&state.config.throttle);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, flood_guard])
        .error_handler(LoggingErrorHandler::with_custom_text("Error in update handler"))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Private messages: activity first, then the flood guard, then handlers
    let message_handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .inspect_async(track_message)
        .filter_async(flood_gate)
        .branch(plugins::command_handler())
        .branch(plugins::composer_handler());

    let callback_handler = Update::filter_callback_query()
        .inspect_async(track_callback)
        .branch(plugins::callback_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
        .branch(events::boost::handler())
}

fn track(state: &AppState, user: &User) {
    state
        .users
        .clone()
        .touch_background(user.id.0, user.username.clone());
}

/// Refresh `last_activity` (runs before every private message handler).
async fn track_message(msg: Message, state: AppState) {
    if let Some(user) = msg.from.as_ref() {
        track(&state, user);
    }
}

async fn track_callback(q: CallbackQuery, state: AppState) {
    track(&state, &q.from);
}
