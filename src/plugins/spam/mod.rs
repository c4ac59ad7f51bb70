//! Broadcast campaign composer (`/spam`).
//!
//! Admins build a campaign step by step; confirmed campaigns are persisted as
//! `created` and handed to the broadcast workers.

mod composer;

pub use composer::Composer;
use composer::ComposerReply;

use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::{error, info};

use super::answer;
use crate::bot::Incoming;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{Audience, Campaign, CampaignPayload};
use crate::i18n::{ADMIN_LANGUAGE, get_text, t};
use crate::utils::{html_escape, keyboards};

/// Handle /spam.
pub async fn spam_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(admin_id) = msg.from.as_ref().map(|u| u.id.0).filter(|id| state.is_admin(*id)) else {
        bot.send_message(msg.chat.id, get_text(ADMIN_LANGUAGE, "admin.only_admins"))
            .await?;
        return Ok(());
    };

    state.composer.open(admin_id);
    render(&bot, &state, msg.chat.id, admin_id, ComposerReply::AskLanguage).await
}

/// Handle /cancel.
pub async fn cancel_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(admin_id) = msg.from.as_ref().map(|u| u.id.0).filter(|id| state.is_admin(*id)) else {
        bot.send_message(msg.chat.id, get_text(ADMIN_LANGUAGE, "admin.only_admins"))
            .await?;
        return Ok(());
    };

    let key = if state.composer.cancel(admin_id) {
        "spam.cancelled"
    } else {
        "spam.no_draft"
    };
    bot.send_message(msg.chat.id, get_text(ADMIN_LANGUAGE, key)).await?;
    Ok(())
}

/// Text or photo sent while a draft is open.
pub async fn composer_message(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(admin_id) = msg.from.as_ref().map(|u| u.id.0) else {
        return Ok(());
    };

    let reply = match Incoming::from_message(&msg) {
        Some(input) => state.composer.handle(admin_id, input),
        None => ComposerReply::ContentMissing,
    };
    render(&bot, &state, msg.chat.id, admin_id, reply).await
}

/// `spam_*` callbacks.
pub async fn composer_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let admin_id = q.from.id.0;
    if !state.is_admin(admin_id) {
        return answer(&bot, &q, Some(get_text(ADMIN_LANGUAGE, "admin.only_admins"))).await;
    }
    answer(&bot, &q, None).await?;

    let Some(input) = Incoming::from_callback(&q) else {
        return Ok(());
    };
    if !state.composer.is_open(admin_id) {
        bot.send_message(ChatId::from(q.from.id), get_text(ADMIN_LANGUAGE, "spam.no_draft"))
            .await?;
        return Ok(());
    }

    // Buttons of a finished step must not be pressed twice.
    if let Some(msg) = q.message.as_ref() {
        let _ = bot.edit_message_reply_markup(msg.chat().id, msg.id()).await;
    }

    let reply = state.composer.handle(admin_id, input);
    render(&bot, &state, ChatId::from(q.from.id), admin_id, reply).await
}

async fn say(bot: &ThrottledBot, chat_id: ChatId, key: &str, keyboard: teloxide::types::InlineKeyboardMarkup) -> anyhow::Result<()> {
    bot.send_message(chat_id, get_text(ADMIN_LANGUAGE, key))
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn render(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    admin_id: u64,
    reply: ComposerReply,
) -> anyhow::Result<()> {
    match reply {
        ComposerReply::AskLanguage => say(bot, chat_id, "spam.choose_audience", keyboards::spam_audience()).await,
        ComposerReply::AskContent => say(bot, chat_id, "spam.send_content", keyboards::spam_content()).await,
        ComposerReply::ContentMissing => say(bot, chat_id, "spam.content_missing", keyboards::spam_cancel()).await,
        ComposerReply::AskButtons => say(bot, chat_id, "spam.ask_buttons", keyboards::spam_buttons()).await,
        ComposerReply::AskButtonText => say(bot, chat_id, "spam.button_text", keyboards::spam_cancel()).await,
        ComposerReply::AskButtonUrl => say(bot, chat_id, "spam.button_url", keyboards::spam_cancel()).await,
        ComposerReply::InvalidUrl => say(bot, chat_id, "spam.invalid_url", keyboards::spam_cancel()).await,
        ComposerReply::ButtonAdded => say(bot, chat_id, "spam.button_added", keyboards::spam_more_buttons()).await,
        ComposerReply::Preview(payload) => preview(bot, chat_id, &payload).await,
        ComposerReply::Confirmed(audience, payload) => launch(bot, state, chat_id, admin_id, audience, payload).await,
        ComposerReply::Cancelled => {
            bot.send_message(chat_id, get_text(ADMIN_LANGUAGE, "spam.cancelled"))
                .await?;
            Ok(())
        }
        ComposerReply::Ignored => Ok(()),
    }
}

fn preview_text(payload: &CampaignPayload) -> String {
    let lang = ADMIN_LANGUAGE;
    let mut text = t(
        lang,
        "spam.preview",
        &[("caption", payload.caption.as_deref().unwrap_or_default())],
    );

    if !payload.buttons.is_empty() {
        let buttons: String = payload
            .buttons
            .iter()
            .flatten()
            .map(|b| format!("\n• {} → {}", html_escape(&b.text), html_escape(&b.url)))
            .collect();
        text.push_str(&t(lang, "spam.preview_buttons", &[("buttons", &buttons)]));
    }
    text
}

/// Show the campaign as recipients will see it, with the confirm keyboard.
async fn preview(bot: &ThrottledBot, chat_id: ChatId, payload: &CampaignPayload) -> anyhow::Result<()> {
    let keyboard = keyboards::spam_confirm(payload);

    match payload.photo.as_ref() {
        Some(file_id) => {
            bot.send_photo(chat_id, InputFile::file_id(file_id))
                .caption(preview_text(payload))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, preview_text(payload))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn launch(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    admin_id: u64,
    audience: Audience,
    payload: CampaignPayload,
) -> anyhow::Result<()> {
    let campaign = Campaign::new(payload, audience, admin_id);
    let id = campaign.campaign_id.clone();

    let queued = match state.campaigns.insert(&campaign).await {
        Ok(()) => state.broadcast.enqueue(campaign),
        Err(e) => Err(e),
    };

    let key = match queued {
        Ok(()) => {
            info!("Admin {} queued campaign {} for {}", admin_id, id, audience.code());
            "spam.started"
        }
        Err(e) => {
            error!("Cannot queue campaign {}: {}", id, e);
            "spam.failed"
        }
    };

    bot.send_message(chat_id, get_text(ADMIN_LANGUAGE, key)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InlineButton;

    #[test]
    fn preview_lists_buttons_escaped() {
        let payload = CampaignPayload {
            caption: Some("<b>News</b>".to_string()),
            photo: None,
            buttons: vec![vec![InlineButton::new("A&B", "https://example.com")]],
        };

        let text = preview_text(&payload);
        assert!(text.contains("<b>News</b>"));
        assert!(text.contains("A&amp;B → https://example.com"));
    }

    #[test]
    fn preview_without_buttons_has_no_button_block() {
        let payload = CampaignPayload {
            caption: None,
            photo: Some("file".to_string()),
            buttons: Vec::new(),
        };
        assert!(!preview_text(&payload).contains("→"));
    }
}
