//! Bot-wide settings (`settings` collection, single document).

use serde::{Deserialize, Serialize};

pub const SETTINGS_ID: &str = "global";

/// Points paid when a referred user registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRewards {
    /// Paid to the user who shared the link.
    #[serde(default = "default_referrer_bonus")]
    pub referrer_bonus: i64,
    /// Paid to the newcomer.
    #[serde(default = "default_referee_bonus")]
    pub referee_bonus: i64,
}

fn default_referrer_bonus() -> i64 {
    300
}

fn default_referee_bonus() -> i64 {
    100
}

impl Default for ReferralRewards {
    fn default() -> Self {
        Self {
            referrer_bonus: default_referrer_bonus(),
            referee_bonus: default_referee_bonus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub referral: ReferralRewards,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            referral: ReferralRewards::default(),
        }
    }
}
