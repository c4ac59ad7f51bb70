//! Main menu screens: language, profile, leaderboard and referral link.

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

use super::start::{joined_main_channel, send_main_menu};
use super::{answer, show};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::Language;
use crate::i18n::{get_text, t};
use crate::utils::{html_escape, keyboards};

/// Entries on the leaderboard.
const TOP_LIMIT: i64 = 10;

/// `/change_language`: registered and subscribed users only.
pub async fn change_language_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0;

    let registered = state.users.get_by_id(user_id).await?;
    if registered.is_none() || !joined_main_channel(&state, user_id).await {
        let lang = registered.and_then(|u| u.language).unwrap_or(Language::Ru);
        bot.send_message(msg.chat.id, get_text(lang, "language.change_denied"))
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, get_text(Language::En, "language.choose"))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::language_choice())
        .await?;
    Ok(())
}

/// `language_<code>`: store the choice and open the main menu.
pub async fn language_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
    lang: Language,
) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    if state.users.get_by_id(user_id).await?.is_none() {
        return answer(&bot, &q, Some(get_text(lang, "language.change_denied"))).await;
    }

    state.users.set_language(user_id, lang).await?;
    answer(&bot, &q, None).await?;

    if let Some(msg) = q.message.as_ref() {
        let _ = bot.delete_message(msg.chat().id, msg.id()).await;
    }
    send_main_menu(&bot, ChatId::from(q.from.id), lang).await
}

pub async fn profile_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState, lang: Language) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;

    let user_id = q.from.id.0;
    let Some(user) = state.users.get_by_id(user_id).await? else {
        return show(&bot, &q, get_text(lang, "common.error"), keyboards::back_to_menu(lang)).await;
    };
    let referrals = state.users.count_referrals(user_id).await?;

    let name = match user.tg_name.as_deref() {
        Some(name) => format!("@{}", html_escape(name)),
        None => get_text(lang, "common.not_specified"),
    };
    let text = t(
        lang,
        "profile.text",
        &[
            ("name", &name),
            ("referrals", &referrals.to_string()),
            ("bonus", &user.bonus_points.to_string()),
        ],
    );

    show(&bot, &q, text, keyboards::back_to_menu(lang)).await
}

pub async fn top_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState, lang: Language) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;

    let top = state.users.top_users(TOP_LIMIT).await?;
    let text = if top.is_empty() {
        get_text(lang, "top.empty")
    } else {
        let mut text = get_text(lang, "top.title");
        for (position, user) in top.iter().enumerate() {
            text.push('\n');
            text.push_str(&t(
                lang,
                "top.line",
                &[
                    ("position", &(position + 1).to_string()),
                    ("name", &html_escape(&user.display_name())),
                    ("points", &user.bonus_points.to_string()),
                ],
            ));
        }
        text
    };

    show(&bot, &q, text, keyboards::back_to_menu(lang)).await
}

pub async fn referral_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState, lang: Language) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;

    let Some(user) = state.users.get_by_id(q.from.id.0).await? else {
        return show(&bot, &q, get_text(lang, "common.error"), keyboards::back_to_menu(lang)).await;
    };

    let bonus = match state.settings.referral_rewards().await {
        Ok(rewards) => rewards.referrer_bonus,
        Err(e) => {
            warn!("Cannot read referral rewards: {}", e);
            crate::database::ReferralRewards::default().referrer_bonus
        }
    };

    let link = state.referral_link(&user.referral_code);
    let text = t(
        lang,
        "referral.text",
        &[("bonus", &bonus.to_string()), ("link", &link)],
    );

    show(&bot, &q, text, keyboards::referral(lang, &link)).await
}

pub async fn back_callback(bot: ThrottledBot, q: CallbackQuery, _state: AppState, lang: Language) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;
    show(&bot, &q, get_text(lang, "menu.text"), keyboards::main_menu(lang)).await
}
