//! User ledger model.
//!
//! One document per Telegram user: points, referral linkage, task flags and
//! activity timestamps.

use serde::{Deserialize, Serialize};

/// Interface language chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
}

impl Language {
    /// Short code used in storage, callback data and translation lookup.
    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ru" => Some(Self::Ru),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

/// One-time achievements that grant bonus points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Marker substring in the display name.
    Name,
    /// Member of every configured channel.
    Subscribe,
    /// Enough referred friends.
    Invite,
    /// Boosting the configured chat.
    Boost,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [Self::Name, Self::Subscribe, Self::Invite, Self::Boost];

    /// Dotted document path of the completion flag.
    pub fn field(self) -> &'static str {
        match self {
            Self::Name => "tasks.name",
            Self::Subscribe => "tasks.subscribe",
            Self::Invite => "tasks.invite",
            Self::Boost => "tasks.boost",
        }
    }

    /// Points granted on completion.
    pub fn reward(self) -> i64 {
        match self {
            Self::Name => 2500,
            Self::Subscribe => 2000,
            Self::Invite => 1000,
            Self::Boost => 2500,
        }
    }
}

/// Completion flags, one per task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFlags {
    #[serde(default)]
    pub name: bool,
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub invite: bool,
    #[serde(default)]
    pub boost: bool,
}

impl TaskFlags {
    pub fn is_completed(&self, task: TaskKind) -> bool {
        match task {
            TaskKind::Name => self.name,
            TaskKind::Subscribe => self.subscribe,
            TaskKind::Invite => self.invite,
            TaskKind::Boost => self.boost,
        }
    }

    #[cfg(test)]
    pub fn mark(&mut self, task: TaskKind) {
        match task {
            TaskKind::Name => self.name = true,
            TaskKind::Subscribe => self.subscribe = true,
            TaskKind::Invite => self.invite = true,
            TaskKind::Boost => self.boost = true,
        }
    }
}

/// Stored user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Telegram user ID.
    pub user_id: u64,
    /// User who referred this one (set once, at registration).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer_id: Option<u64>,
    /// Opaque token embedded in the user's referral link.
    pub referral_code: String,
    /// Telegram username without @.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg_name: Option<String>,
    /// Never decreases.
    #[serde(default)]
    pub bonus_points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Unix timestamp.
    pub last_activity: i64,
    /// Unix timestamp.
    pub registration_date: i64,
    /// Referral bonus already paid for this user.
    #[serde(default)]
    pub bonus_awarded: bool,
    #[serde(default)]
    pub tasks: TaskFlags,
}

impl UserRecord {
    /// Create a fresh record with a new referral code.
    pub fn new(user_id: u64, referer_id: Option<u64>, tg_name: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id,
            // A user can never refer themselves.
            referer_id: referer_id.filter(|id| *id != user_id),
            referral_code: uuid::Uuid::new_v4().to_string(),
            tg_name,
            bonus_points: 0,
            language: None,
            last_activity: now,
            registration_date: now,
            bonus_awarded: false,
            tasks: TaskFlags::default(),
        }
    }

    /// Name shown in lists.
    pub fn display_name(&self) -> String {
        self.tg_name
            .as_ref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| self.user_id.to_string())
    }
}
