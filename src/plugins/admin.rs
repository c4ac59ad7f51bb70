//! Admin panel: analytics, paged user list, CSV export and referral bonus
//! settings.
//!
//! Admin screens are always rendered in `ADMIN_LANGUAGE`.

use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::info;

use super::{answer, show};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{ReferralRewards, TaskKind, UserStatistics};
use crate::i18n::{ADMIN_LANGUAGE, get_text, t};
use crate::utils::keyboards::{self, USERS_PER_PAGE, split_page};
use crate::utils::export::users_csv;
use crate::utils::{format_average, html_escape, parse_bonus_args, parse_page};

/// Reply to non-admins and report whether the caller may proceed.
async fn ensure_admin(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<bool> {
    let allowed = msg.from.as_ref().is_some_and(|u| state.is_admin(u.id.0));
    if !allowed {
        bot.send_message(msg.chat.id, get_text(ADMIN_LANGUAGE, "admin.only_admins"))
            .await?;
    }
    Ok(allowed)
}

/// Handle /admin_panel.
pub async fn admin_panel_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    bot.send_message(msg.chat.id, get_text(ADMIN_LANGUAGE, "admin.panel"))
        .reply_markup(keyboards::admin_panel())
        .await?;
    Ok(())
}

/// Handle `/set_bonus <referrer> <referee>`.
pub async fn set_bonus_command(bot: ThrottledBot, msg: Message, state: AppState, args: String) -> anyhow::Result<()> {
    if !ensure_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let Some((referrer_bonus, referee_bonus)) = parse_bonus_args(&args) else {
        bot.send_message(msg.chat.id, html_escape(&get_text(ADMIN_LANGUAGE, "admin.set_bonus_usage")))
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    };

    state
        .settings
        .update_referral_rewards(ReferralRewards {
            referrer_bonus,
            referee_bonus,
        })
        .await?;
    info!("Referral rewards set to {}/{}", referrer_bonus, referee_bonus);

    let text = t(
        ADMIN_LANGUAGE,
        "admin.set_bonus_done",
        &[
            ("referrer", &referrer_bonus.to_string()),
            ("referee", &referee_bonus.to_string()),
        ],
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// `admin_analytics`, `admin_user_list:<page>` and `admin_back`.
pub async fn panel_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState, data: &str) -> anyhow::Result<()> {
    if !state.is_admin(q.from.id.0) {
        return answer(&bot, &q, Some(get_text(ADMIN_LANGUAGE, "admin.only_admins"))).await;
    }
    answer(&bot, &q, None).await?;

    if data == "admin_analytics" {
        let stats = state.users.statistics().await?;
        return show(&bot, &q, analytics_text(&stats), keyboards::admin_back()).await;
    }

    if let Some(page) = parse_page(data) {
        let (text, keyboard) = user_list(&state, page).await?;
        return show(&bot, &q, text, keyboard).await;
    }

    show(
        &bot,
        &q,
        get_text(ADMIN_LANGUAGE, "admin.panel"),
        keyboards::admin_panel(),
    )
    .await
}

/// `admin_export`: send the whole user table as a CSV document.
pub async fn export_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    if !state.is_admin(q.from.id.0) {
        return answer(&bot, &q, Some(get_text(ADMIN_LANGUAGE, "admin.only_admins"))).await;
    }
    answer(&bot, &q, None).await?;

    let users = state.users.all().await?;
    let file = InputFile::memory(users_csv(&users)?).file_name("users.csv");
    let caption = t(ADMIN_LANGUAGE, "admin.export_caption", &[("count", &users.len().to_string())]);

    bot.send_document(ChatId::from(q.from.id), file)
        .caption(caption)
        .await?;
    info!("Admin {} exported {} users", q.from.id.0, users.len());
    Ok(())
}

fn task_label(task: TaskKind) -> String {
    let key = match task {
        TaskKind::Name => "admin.task_name",
        TaskKind::Subscribe => "admin.task_subscribe",
        TaskKind::Invite => "admin.task_invite",
        TaskKind::Boost => "admin.task_boost",
    };
    get_text(ADMIN_LANGUAGE, key)
}

fn analytics_text(stats: &UserStatistics) -> String {
    let lang = ADMIN_LANGUAGE;
    let mut text = t(
        lang,
        "admin.analytics",
        &[
            ("total", &stats.total_users.to_string()),
            ("active", &stats.active_users.to_string()),
            ("new", &stats.new_users.to_string()),
            ("average", &format_average(stats.average_bonus)),
            ("bonus", &stats.total_bonus.to_string()),
            ("referrals", &stats.total_referrals.to_string()),
            ("referrers", &stats.active_referrers.to_string()),
        ],
    );

    for (task, count) in &stats.tasks_completed {
        text.push('\n');
        text.push_str(&t(
            lang,
            "admin.task_line",
            &[("task", &task_label(*task)), ("count", &count.to_string())],
        ));
    }
    text
}

/// 1-based page number for display.
fn page_number(page: u64) -> String {
    page.saturating_add(1).to_string()
}

/// One page of users. Pages past the end are empty, not errors.
async fn user_list(
    state: &AppState,
    page: u64,
) -> anyhow::Result<(String, teloxide::types::InlineKeyboardMarkup)> {
    let lang = ADMIN_LANGUAGE;
    let offset = page.saturating_mul(USERS_PER_PAGE);
    // One extra row tells whether a next page exists.
    let rows = state.users.page(offset, USERS_PER_PAGE + 1).await?;
    let (users, has_next) = split_page(rows, USERS_PER_PAGE);

    let mut text = t(lang, "admin.user_list", &[("page", &page_number(page))]);
    if users.is_empty() {
        text.push('\n');
        text.push_str(&get_text(lang, "admin.user_list_empty"));
    }
    for user in &users {
        text.push('\n');
        text.push_str(&t(
            lang,
            "admin.user_line",
            &[
                ("id", &user.user_id.to_string()),
                ("name", &html_escape(&user.display_name())),
                ("points", &user.bonus_points.to_string()),
            ],
        ));
    }

    Ok((text, keyboards::user_list_nav(page, has_next)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_lists_every_task() {
        let stats = UserStatistics {
            total_users: 12,
            average_bonus: 150.25,
            tasks_completed: TaskKind::ALL.iter().map(|t| (*t, 3)).collect(),
            ..UserStatistics::default()
        };

        let text = analytics_text(&stats);
        assert!(text.contains("12"));
        assert!(text.contains("150.2") || text.contains("150.3"));
        assert_eq!(text.matches("✅").count(), TaskKind::ALL.len());
        assert!(!text.contains('{'));
    }

    #[test]
    fn page_number_saturates() {
        assert_eq!(page_number(0), "1");
        assert_eq!(page_number(u64::MAX), u64::MAX.to_string());
        assert_eq!(parse_page("admin_user_list:18446744073709551615"), Some(u64::MAX));
    }
}
