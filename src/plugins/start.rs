//! /start command plugin.
//!
//! Visitors must join the main channel before they are registered. The
//! referral code from the deep link is remembered until they pass the check.

use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};
use tracing::{info, warn};

use super::answer;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::Language;
use crate::i18n::get_text;
use crate::utils::keyboards;

/// Handle `/start [code]`.
pub async fn start_command(bot: ThrottledBot, msg: Message, state: AppState, args: String) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let code = Some(args.trim()).filter(|c| !c.is_empty());

    if !joined_main_channel(&state, user.id.0).await {
        if let Some(code) = code {
            state.pending_referrals.insert(user.id.0, code.to_string());
        }
        let lang = state.user_language(user.id.0).await.unwrap_or(Language::Ru);
        send_gate(&bot, &state, msg.chat.id, lang).await?;
        return Ok(());
    }

    register_and_greet(&bot, &state, msg.chat.id, user, code).await
}

/// Re-run the flow after the visitor claims to have joined.
pub async fn check_subscription_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;

    if !joined_main_channel(&state, user_id).await {
        let lang = state.user_language(user_id).await.unwrap_or(Language::Ru);
        return answer(&bot, &q, Some(get_text(lang, "start.still_not_subscribed"))).await;
    }

    answer(&bot, &q, None).await?;

    let code = state.pending_referrals.get(&user_id);
    state.pending_referrals.invalidate(&user_id);

    if let Some(msg) = q.message.as_ref() {
        // The gate is obsolete; failing to delete it is harmless.
        let _ = bot.delete_message(msg.chat().id, msg.id()).await;
    }

    register_and_greet(&bot, &state, ChatId::from(q.from.id), &q.from, code.as_deref()).await
}

/// Fail-closed main channel check. Passes when no main channel is configured.
pub(crate) async fn joined_main_channel(state: &AppState, user_id: u64) -> bool {
    let Some(channel) = state.config.main_channel.as_ref() else {
        return true;
    };

    match state.membership.is_member(channel.chat_id, user_id).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Main channel lookup failed for {}: {}", user_id, e);
            false
        }
    }
}

async fn send_gate(bot: &ThrottledBot, state: &AppState, chat_id: ChatId, lang: Language) -> anyhow::Result<()> {
    let Some(channel) = state.config.main_channel.as_ref() else {
        return Ok(());
    };

    bot.send_message(chat_id, get_text(lang, "start.not_subscribed"))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::main_channel_gate(lang, channel))
        .await?;
    Ok(())
}

/// Register the user (paying the referral bonus once), then show the
/// language choice for newcomers or the main menu for everyone else.
async fn register_and_greet(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    user: &User,
    code: Option<&str>,
) -> anyhow::Result<()> {
    let rewards = match state.settings.referral_rewards().await {
        Ok(rewards) => rewards,
        Err(e) => {
            warn!("Falling back to default referral rewards: {}", e);
            Default::default()
        }
    };

    let registration = state
        .referrals
        .register(user.id.0, user.username.clone(), code, rewards)
        .await?;

    if registration.is_new {
        info!("New user {} joined (referrer: {:?})", user.id.0, registration.user.referer_id);
    }
    if let Some(referrer) = registration.rewarded_referrer {
        info!(
            "Referral bonus paid: referrer {} +{}, user {} +{}",
            referrer, rewards.referrer_bonus, user.id.0, rewards.referee_bonus
        );
    }

    match registration.user.language {
        Some(lang) => send_main_menu(bot, chat_id, lang).await,
        None => {
            bot.send_message(chat_id, get_text(Language::En, "language.choose"))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::language_choice())
                .await?;
            Ok(())
        }
    }
}

pub(crate) async fn send_main_menu(bot: &ThrottledBot, chat_id: ChatId, lang: Language) -> anyhow::Result<()> {
    bot.send_message(chat_id, get_text(lang, "menu.text"))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::main_menu(lang))
        .await?;
    Ok(())
}
