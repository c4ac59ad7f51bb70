//! Database models.

pub mod campaign;
pub mod chat_boost;
pub mod common;
pub mod delivery;
pub mod settings;
pub mod subscription;
pub mod user;

pub use campaign::{Audience, Campaign, CampaignPayload, CampaignStatus, CampaignSummary};
pub use chat_boost::ChatBoostRecord;
pub use common::{InlineButton, url_keyboard};
pub use delivery::{DeliveryRecord, DeliveryStatus};
pub use settings::{BotSettings, ReferralRewards, SETTINGS_ID};
pub use subscription::ChannelReward;
pub use user::{Language, TaskFlags, TaskKind, UserRecord};
