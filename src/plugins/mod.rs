//! Plugin system for command and callback handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Routing its command in `command_handler()` or its callback data in
//!    `route_callback()`

pub mod admin;
pub mod menu;
pub mod spam;
pub mod start;
pub mod tasks;

pub use spam::Composer;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::Language;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start(String),

    #[command(description = "Change the interface language")]
    ChangeLanguage,

    // Admin commands
    #[command(description = "Admin panel")]
    AdminPanel,

    #[command(description = "Create a broadcast")]
    Spam,

    #[command(description = "Cancel the broadcast draft")]
    Cancel,

    #[command(description = "Set referral bonuses: /set_bonus <referrer> <referee>")]
    SetBonus(String),
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(args)].endpoint(start::start_command))
        .branch(case![Command::ChangeLanguage].endpoint(menu::change_language_command))
        // Admin
        .branch(case![Command::AdminPanel].endpoint(admin::admin_panel_command))
        .branch(case![Command::SetBonus(args)].endpoint(admin::set_bonus_command))
        .branch(case![Command::Spam].endpoint(spam::spam_command))
        .branch(case![Command::Cancel].endpoint(spam::cancel_command))
}

/// Text and photos from an admin with an open campaign draft.
pub fn composer_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message, state: AppState| {
        msg.from
            .as_ref()
            .is_some_and(|u| state.is_admin(u.id.0) && state.composer.is_open(u.id.0))
    })
    .endpoint(spam::composer_message)
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            dptree::filter(|q: CallbackQuery| q.data.as_deref().is_some_and(|d| d.starts_with("spam_")))
                .endpoint(spam::composer_callback),
        )
        .branch(dptree::endpoint(route_callback))
}

/// Split `<action>_<lang>` callback data.
fn localized(data: &str) -> Option<(&str, Language)> {
    let (action, code) = data.rsplit_once('_')?;
    Some((action, Language::from_code(code)?))
}

async fn route_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    if let Some((action, lang)) = localized(&data) {
        match action {
            "language" => return menu::language_callback(bot, q, state, lang).await,
            "profile" => return menu::profile_callback(bot, q, state, lang).await,
            "tasks" => return tasks::board_callback(bot, q, state, lang).await,
            "top10" => return menu::top_callback(bot, q, state, lang).await,
            "referral" => return menu::referral_callback(bot, q, state, lang).await,
            "back" => return menu::back_callback(bot, q, state, lang).await,
            _ => {}
        }
    }

    match data.as_str() {
        "check_subscription" => start::check_subscription_callback(bot, q, state).await,
        "task_name" => tasks::name_callback(bot, q, state).await,
        "task_subscribe" => tasks::subscribe_callback(bot, q, state).await,
        "checksub" => tasks::checksub_callback(bot, q, state).await,
        "task_invite" => tasks::invite_callback(bot, q, state).await,
        "task_boost" => tasks::boost_callback(bot, q, state).await,
        "check_boost" => tasks::check_boost_callback(bot, q, state).await,
        "task_already_completed" => tasks::already_completed_callback(bot, q, state).await,
        "admin_export" => admin::export_callback(bot, q, state).await,
        "admin_analytics" | "admin_back" => admin::panel_callback(bot, q, state, &data).await,
        d if d.starts_with("admin_user_list:") => admin::panel_callback(bot, q, state, &data).await,
        _ => {
            // `noop` and stale buttons only need the spinner stopped.
            bot.answer_callback_query(q.id).await?;
            Ok(())
        }
    }
}

/// Replace the callback's message with a new screen, or send one when the
/// message cannot be edited (too old, or a photo).
pub(crate) async fn show(
    bot: &ThrottledBot,
    q: &CallbackQuery,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> anyhow::Result<()> {
    let chat_id = match q.message.as_ref() {
        Some(msg) => {
            let edited = bot
                .edit_message_text(msg.chat().id, msg.id(), text.clone())
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard.clone())
                .await;
            match edited {
                Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
                Err(e) => {
                    debug!("Cannot edit callback message, sending a new one: {}", e);
                    msg.chat().id
                }
            }
        }
        None => ChatId::from(q.from.id),
    };

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Stop the button spinner, optionally with a popup.
pub(crate) async fn answer(bot: &ThrottledBot, q: &CallbackQuery, alert: Option<String>) -> anyhow::Result<()> {
    let mut req = bot.answer_callback_query(q.id.clone());
    if let Some(text) = alert {
        req = req.text(text).show_alert(true);
    }
    req.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_data_splits_on_last_underscore() {
        assert_eq!(localized("profile_ru"), Some(("profile", Language::Ru)));
        assert_eq!(localized("top10_en"), Some(("top10", Language::En)));
        assert_eq!(localized("task_name"), None);
        assert_eq!(localized("noop"), None);
    }

    #[test]
    fn commands_use_snake_case() {
        let parse = |text: &str| Command::parse(text, "bonusbot").ok();

        assert!(matches!(parse("/change_language"), Some(Command::ChangeLanguage)));
        assert!(matches!(parse("/admin_panel"), Some(Command::AdminPanel)));
        assert!(matches!(parse("/set_bonus 300 100"), Some(Command::SetBonus(args)) if args == "300 100"));
        assert!(matches!(parse("/start abc"), Some(Command::Start(code)) if code == "abc"));
    }
}
