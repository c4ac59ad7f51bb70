//! CSV export of the user table.

use anyhow::Result;
use chrono::DateTime;
use serde::Serialize;

use crate::database::UserRecord;

#[derive(Serialize)]
struct ExportRow<'a> {
    user_id: u64,
    username: &'a str,
    referer_id: Option<u64>,
    referral_code: &'a str,
    bonus_points: i64,
    language: &'a str,
    bonus_awarded: bool,
    task_name: bool,
    task_subscribe: bool,
    task_invite: bool,
    task_boost: bool,
    registration_date: String,
    last_activity: String,
}

fn timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

impl<'a> From<&'a UserRecord> for ExportRow<'a> {
    fn from(user: &'a UserRecord) -> Self {
        Self {
            user_id: user.user_id,
            username: user.tg_name.as_deref().unwrap_or_default(),
            referer_id: user.referer_id,
            referral_code: &user.referral_code,
            bonus_points: user.bonus_points,
            language: user.language.map(|l| l.code()).unwrap_or_default(),
            bonus_awarded: user.bonus_awarded,
            task_name: user.tasks.name,
            task_subscribe: user.tasks.subscribe,
            task_invite: user.tasks.invite,
            task_boost: user.tasks.boost,
            registration_date: timestamp(user.registration_date),
            last_activity: timestamp(user.last_activity),
        }
    }
}

/// Serialize users to CSV with a header row (UTC timestamps).
pub fn users_csv(users: &[UserRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for user in users {
        writer.serialize(ExportRow::from(user))?;
    }
    Ok(writer.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Language;

    fn record(user_id: u64) -> UserRecord {
        let mut user = UserRecord::new(user_id, None, None);
        user.referral_code = format!("code-{user_id}");
        user.registration_date = 0;
        user.last_activity = 86_400;
        user
    }

    #[test]
    fn rows_follow_header() {
        let mut alice = record(1);
        alice.tg_name = Some("alice".to_string());
        alice.bonus_points = 300;
        alice.language = Some(Language::En);
        alice.tasks.invite = true;

        let mut bob = record(2);
        bob.referer_id = Some(1);
        bob.bonus_awarded = true;

        let csv = String::from_utf8(users_csv(&[alice, bob]).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("user_id,username,referer_id,referral_code,bonus_points"));
        assert_eq!(
            lines[1],
            "1,alice,,code-1,300,en,false,false,false,true,false,1970-01-01 00:00:00,1970-01-02 00:00:00"
        );
        assert!(lines[2].starts_with("2,,1,code-2,0,,true,"));
    }

    #[test]
    fn names_with_commas_are_quoted() {
        let mut user = record(3);
        user.tg_name = Some("a,b".to_string());

        let csv = String::from_utf8(users_csv(&[user]).unwrap()).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("3,\"a,b\","));
    }

    #[test]
    fn empty_table_has_no_rows() {
        assert!(users_csv(&[]).unwrap().is_empty());
    }
}
