//! Task board and task check callbacks.

use teloxide::prelude::*;
use tracing::warn;

use super::{answer, show};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{Language, TaskKind};
use crate::i18n::{get_text, t};
use crate::services::{INVITE_THRESHOLD, TaskOutcome};
use crate::utils::{html_escape, keyboards};

async fn language_of(state: &AppState, q: &CallbackQuery) -> Language {
    state.user_language(q.from.id.0).await.unwrap_or(Language::Ru)
}

fn reward(task: TaskKind) -> String {
    task.reward().to_string()
}

/// `tasks_<lang>`: the board with completion markers.
pub async fn board_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState, lang: Language) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;

    let flags = state.tasks.board(q.from.id.0).await?;
    let marker = html_escape(&state.config.name_marker);
    show(
        &bot,
        &q,
        get_text(lang, "tasks.intro"),
        keyboards::task_board(lang, &flags, &marker),
    )
    .await
}

pub async fn already_completed_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let lang = language_of(&state, &q).await;
    answer(&bot, &q, Some(get_text(lang, "tasks.already_completed"))).await
}

/// Display name (first + last) must contain the marker.
pub async fn name_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;
    let lang = language_of(&state, &q).await;
    let marker = html_escape(&state.config.name_marker);

    let text = match state.tasks.check_name(q.from.id.0, &q.from.full_name()).await? {
        TaskOutcome::Granted { reward } => t(
            lang,
            "tasks.name_granted",
            &[("marker", &marker), ("reward", &reward.to_string())],
        ),
        TaskOutcome::AlreadyCompleted => get_text(lang, "tasks.already_completed"),
        TaskOutcome::NotEligible => t(lang, "tasks.name_missing", &[("marker", &marker)]),
    };

    show(&bot, &q, text, keyboards::back_to_tasks(lang)).await
}

/// Subscription screen with a status marker per channel.
pub async fn subscribe_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;
    let lang = language_of(&state, &q).await;

    if state.config.channels.is_empty() {
        return show(&bot, &q, get_text(lang, "tasks.unavailable"), keyboards::back_to_tasks(lang)).await;
    }

    let text = t(lang, "tasks.subscribe_prompt", &[("reward", &reward(TaskKind::Subscribe))]);
    let keyboard = subscription_keyboard(&state, q.from.id.0, lang).await;
    show(&bot, &q, text, keyboard).await
}

/// `checksub`: pay the bundle once every channel is joined.
pub async fn checksub_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let lang = language_of(&state, &q).await;
    let user_id = q.from.id.0;

    if state.config.channels.is_empty() {
        answer(&bot, &q, None).await?;
        return show(&bot, &q, get_text(lang, "tasks.unavailable"), keyboards::back_to_tasks(lang)).await;
    }

    match state.tasks.check_subscription(user_id).await? {
        TaskOutcome::Granted { reward } => {
            answer(&bot, &q, None).await?;
            for channel in &state.config.channels {
                if let Err(e) = state.subscriptions.mark_received(user_id, channel.chat_id).await {
                    warn!("Cannot record subscription reward of {} in {}: {}", user_id, channel.chat_id, e);
                }
            }
            let text = t(lang, "tasks.subscribe_granted", &[("reward", &reward.to_string())]);
            show(&bot, &q, text, keyboards::back_to_tasks(lang)).await
        }
        TaskOutcome::AlreadyCompleted => {
            answer(&bot, &q, None).await?;
            show(&bot, &q, get_text(lang, "tasks.already_completed"), keyboards::back_to_tasks(lang)).await
        }
        TaskOutcome::NotEligible => {
            answer(&bot, &q, Some(get_text(lang, "tasks.subscribe_missing"))).await?;
            let text = t(lang, "tasks.subscribe_prompt", &[("reward", &reward(TaskKind::Subscribe))]);
            let keyboard = subscription_keyboard(&state, user_id, lang).await;
            show(&bot, &q, text, keyboard).await
        }
    }
}

async fn subscription_keyboard(
    state: &AppState,
    user_id: u64,
    lang: Language,
) -> teloxide::types::InlineKeyboardMarkup {
    let statuses = state.tasks.channel_statuses(user_id).await;
    let channels: Vec<_> = state
        .config
        .channels
        .iter()
        .zip(statuses)
        .map(|(channel, (_, subscribed))| (channel, subscribed))
        .collect();
    keyboards::subscription_task(lang, &channels)
}

pub async fn invite_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;
    let lang = language_of(&state, &q).await;

    let (outcome, count) = state.tasks.check_invite(q.from.id.0).await?;
    let count = count.to_string();
    let required = INVITE_THRESHOLD.to_string();

    let text = match outcome {
        TaskOutcome::Granted { reward } => t(
            lang,
            "tasks.invite_granted",
            &[("required", &required), ("reward", &reward.to_string()), ("count", &count)],
        ),
        TaskOutcome::AlreadyCompleted => t(lang, "tasks.invite_already", &[("count", &count)]),
        TaskOutcome::NotEligible => t(
            lang,
            "tasks.invite_progress",
            &[("required", &required), ("count", &count)],
        ),
    };

    show(&bot, &q, text, keyboards::back_to_tasks(lang)).await
}

pub async fn boost_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    answer(&bot, &q, None).await?;
    let lang = language_of(&state, &q).await;

    if state.config.boost_chat_id.is_none() {
        return show(&bot, &q, get_text(lang, "tasks.unavailable"), keyboards::back_to_tasks(lang)).await;
    }

    let text = t(lang, "tasks.boost_prompt", &[("reward", &reward(TaskKind::Boost))]);
    show(&bot, &q, text, keyboards::boost_task(lang, state.config.boost_url.as_deref())).await
}

pub async fn check_boost_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let lang = language_of(&state, &q).await;

    match state.tasks.check_boost(q.from.id.0).await? {
        TaskOutcome::Granted { reward } => {
            answer(&bot, &q, None).await?;
            let text = t(lang, "tasks.boost_granted", &[("reward", &reward.to_string())]);
            show(&bot, &q, text, keyboards::back_to_tasks(lang)).await
        }
        TaskOutcome::AlreadyCompleted => {
            answer(&bot, &q, Some(get_text(lang, "tasks.already_completed"))).await
        }
        TaskOutcome::NotEligible => answer(&bot, &q, Some(get_text(lang, "tasks.boost_missing"))).await,
    }
}
