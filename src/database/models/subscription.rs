//! Per-channel subscription rewards (`subscriptions` collection).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReward {
    pub user_id: u64,
    pub channel_id: i64,
    pub bonus_received: bool,
    /// Unix timestamp.
    pub received_at: i64,
}
