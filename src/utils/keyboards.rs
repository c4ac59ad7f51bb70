//! Inline keyboards shared by the plugins.
//!
//! Callback data is the routing contract with `plugins::callback_handler`.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::config::ChannelConfig;
use crate::database::{CampaignPayload, Language, TaskFlags, TaskKind, url_keyboard};
use crate::i18n::{ADMIN_LANGUAGE, get_text, t};
use crate::services::INVITE_THRESHOLD;

/// Rows per admin user list page.
pub const USERS_PER_PAGE: u64 = 50;

fn cb(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data)
}

/// URL button, skipped when the link does not parse.
fn link(text: impl Into<String>, url: &str) -> Option<InlineKeyboardButton> {
    Url::parse(url).ok().map(|u| InlineKeyboardButton::url(text, u))
}

fn status(done: bool) -> &'static str {
    if done { "✅" } else { "❌" }
}

pub fn language_choice() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        cb("🇷🇺 Русский", "language_ru"),
        cb("🇬🇧 English", "language_en"),
    ]])
}

/// Join-the-main-channel gate.
pub fn main_channel_gate(lang: Language, channel: &ChannelConfig) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(button) = link(t(lang, "start.subscribe_button", &[("channel", &channel.name)]), &channel.url) {
        rows.push(vec![button]);
    }
    rows.push(vec![cb(get_text(lang, "start.check_button"), "check_subscription")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu(lang: Language) -> InlineKeyboardMarkup {
    let code = lang.code();
    InlineKeyboardMarkup::new(vec![
        vec![
            cb(get_text(lang, "menu.profile"), format!("profile_{code}")),
            cb(get_text(lang, "menu.tasks"), format!("tasks_{code}")),
        ],
        vec![
            cb(get_text(lang, "menu.top"), format!("top10_{code}")),
            cb(get_text(lang, "menu.referral"), format!("referral_{code}")),
        ],
    ])
}

pub fn back_to_menu(lang: Language) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![cb(
        get_text(lang, "common.back"),
        format!("back_{}", lang.code()),
    )]])
}

pub fn back_to_tasks(lang: Language) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![tasks_back_button(lang)]])
}

fn tasks_back_button(lang: Language) -> InlineKeyboardButton {
    cb(get_text(lang, "common.back_to_tasks"), format!("tasks_{}", lang.code()))
}

/// Referral screen: Telegram share link plus back.
pub fn referral(lang: Language, link_url: &str) -> InlineKeyboardMarkup {
    let share_text = t(lang, "referral.share", &[("link", link_url)]);
    let mut rows = Vec::new();

    if let Ok(mut share) = Url::parse("https://t.me/share/url") {
        share
            .query_pairs_mut()
            .append_pair("url", link_url)
            .append_pair("text", &share_text);
        rows.push(vec![InlineKeyboardButton::url(get_text(lang, "referral.invite_button"), share)]);
    }
    rows.push(vec![cb(get_text(lang, "common.back"), format!("back_{}", lang.code()))]);
    InlineKeyboardMarkup::new(rows)
}

/// Task board. Completed tasks route to `task_already_completed`.
pub fn task_board(lang: Language, flags: &TaskFlags, name_marker: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::with_capacity(TaskKind::ALL.len() + 1);

    for task in TaskKind::ALL {
        let done = flags.is_completed(task);
        let reward = task.reward().to_string();
        let args = [("reward", reward.as_str()), ("status", status(done))];

        let (text, data) = match task {
            TaskKind::Name => (
                t(lang, "tasks.name_button", &[args[0], args[1], ("marker", name_marker)]),
                "task_name",
            ),
            TaskKind::Subscribe => (t(lang, "tasks.subscribe_button", &args), "task_subscribe"),
            TaskKind::Invite => (
                t(
                    lang,
                    "tasks.invite_button",
                    &[args[0], args[1], ("required", &INVITE_THRESHOLD.to_string())],
                ),
                "task_invite",
            ),
            TaskKind::Boost => (t(lang, "tasks.boost_button", &args), "task_boost"),
        };

        let data = if done { "task_already_completed" } else { data };
        rows.push(vec![cb(text, data)]);
    }

    rows.push(vec![cb(get_text(lang, "common.back"), format!("back_{}", lang.code()))]);
    InlineKeyboardMarkup::new(rows)
}

/// Channel links with per-channel status, then the re-check button.
pub fn subscription_task(lang: Language, channels: &[(&ChannelConfig, bool)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .filter_map(|(channel, subscribed)| {
            link(format!("{} {}", channel.name, status(*subscribed)), &channel.url)
        })
        .map(|button| vec![button])
        .collect();

    rows.push(vec![cb(get_text(lang, "tasks.check_subscription_button"), "checksub")]);
    rows.push(vec![tasks_back_button(lang)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn boost_task(lang: Language, boost_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(button) = boost_url.and_then(|url| link(get_text(lang, "tasks.boost_open_button"), url)) {
        rows.push(vec![button]);
    }
    rows.push(vec![cb(get_text(lang, "tasks.check_boost_button"), "check_boost")]);
    rows.push(vec![tasks_back_button(lang)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn admin_panel() -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    InlineKeyboardMarkup::new(vec![
        vec![cb(get_text(lang, "admin.analytics_button"), "admin_analytics")],
        vec![cb(get_text(lang, "admin.users_button"), "admin_user_list:0")],
        vec![cb(get_text(lang, "admin.export_button"), "admin_export")],
    ])
}

pub fn admin_back() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![cb(get_text(ADMIN_LANGUAGE, "common.back"), "admin_back")]])
}

/// Prev/next row for the user list; a missing neighbour becomes `noop`.
pub fn user_list_nav(page: u64, has_next: bool) -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    let prev = match page.checked_sub(1) {
        Some(p) => format!("admin_user_list:{p}"),
        None => "noop".to_string(),
    };
    let next = match page.checked_add(1).filter(|_| has_next) {
        Some(p) => format!("admin_user_list:{p}"),
        None => "noop".to_string(),
    };

    InlineKeyboardMarkup::new(vec![
        vec![
            cb(get_text(lang, "admin.prev"), prev),
            cb(get_text(lang, "admin.next"), next),
        ],
        vec![cb(get_text(lang, "common.back"), "admin_back")],
    ])
}

/// Keep the first `per_page` items; report whether more were fetched.
pub fn split_page<T>(mut items: Vec<T>, per_page: u64) -> (Vec<T>, bool) {
    let per_page = per_page as usize;
    let has_next = items.len() > per_page;
    items.truncate(per_page);
    (items, has_next)
}

fn spam_cancel_button() -> InlineKeyboardButton {
    cb(get_text(ADMIN_LANGUAGE, "spam.cancel"), "spam_cancel")
}

pub fn spam_audience() -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    InlineKeyboardMarkup::new(vec![
        vec![
            cb(get_text(lang, "spam.audience_ru"), "spam_language_ru"),
            cb(get_text(lang, "spam.audience_en"), "spam_language_en"),
        ],
        vec![cb(get_text(lang, "spam.audience_all"), "spam_language_all")],
        vec![spam_cancel_button()],
    ])
}

pub fn spam_content() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![cb(get_text(ADMIN_LANGUAGE, "spam.back"), "spam_back_language")],
        vec![spam_cancel_button()],
    ])
}

pub fn spam_buttons() -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    InlineKeyboardMarkup::new(vec![
        vec![
            cb(get_text(lang, "spam.add_button"), "spam_add_button"),
            cb(get_text(lang, "spam.skip_buttons"), "spam_skip_buttons"),
        ],
        vec![cb(get_text(lang, "spam.back"), "spam_back_content")],
        vec![spam_cancel_button()],
    ])
}

pub fn spam_more_buttons() -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    InlineKeyboardMarkup::new(vec![
        vec![
            cb(get_text(lang, "spam.add_another"), "spam_add_button"),
            cb(get_text(lang, "spam.finish_buttons"), "spam_finish_buttons"),
        ],
        vec![spam_cancel_button()],
    ])
}

pub fn spam_cancel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![spam_cancel_button()]])
}

/// Preview keyboard: the campaign's own buttons, then confirm/back/cancel.
pub fn spam_confirm(payload: &CampaignPayload) -> InlineKeyboardMarkup {
    let lang = ADMIN_LANGUAGE;
    let mut rows = url_keyboard(&payload.buttons)
        .map(|markup| markup.inline_keyboard)
        .unwrap_or_default();

    rows.push(vec![cb(get_text(lang, "spam.confirm"), "spam_confirm")]);
    rows.push(vec![
        cb(get_text(lang, "spam.back_buttons"), "spam_back_buttons"),
        cb(get_text(lang, "spam.back"), "spam_back_content"),
    ]);
    rows.push(vec![spam_cancel_button()]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn split_page_reports_more() {
        assert_eq!(split_page(vec![1, 2, 3], 2), (vec![1, 2], true));
        assert_eq!(split_page(vec![1, 2], 2), (vec![1, 2], false));
        assert_eq!(split_page(Vec::<u8>::new(), 50), (vec![], false));
    }

    #[test]
    fn user_list_edges_use_noop() {
        assert_eq!(
            callbacks(&user_list_nav(0, true)),
            vec!["noop", "admin_user_list:1", "admin_back"]
        );
        assert_eq!(
            callbacks(&user_list_nav(3, false)),
            vec!["admin_user_list:2", "noop", "admin_back"]
        );
    }

    #[test]
    fn admin_panel_offers_export() {
        assert_eq!(
            callbacks(&admin_panel()),
            vec!["admin_analytics", "admin_user_list:0", "admin_export"]
        );
    }

    #[test]
    fn last_representable_page_has_no_next() {
        let expected = format!("admin_user_list:{}", u64::MAX - 1);
        assert_eq!(
            callbacks(&user_list_nav(u64::MAX, true)),
            vec![expected.as_str(), "noop", "admin_back"]
        );
    }

    #[test]
    fn completed_tasks_are_rerouted() {
        let mut flags = TaskFlags::default();
        flags.mark(TaskKind::Subscribe);

        assert_eq!(
            callbacks(&task_board(Language::En, &flags, "clown")),
            vec!["task_name", "task_already_completed", "task_invite", "task_boost", "back_en"]
        );
    }

    #[test]
    fn menu_callbacks_carry_language() {
        assert_eq!(
            callbacks(&main_menu(Language::Ru)),
            vec!["profile_ru", "tasks_ru", "top10_ru", "referral_ru"]
        );
    }
}
