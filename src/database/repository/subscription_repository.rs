//! Per-channel subscription rewards (`subscriptions` collection).

use anyhow::Result;
use mongodb::Collection;
use mongodb::bson::doc;

use crate::database::Database;
use crate::database::models::ChannelReward;

pub struct SubscriptionRepository {
    collection: Collection<ChannelReward>,
}

impl SubscriptionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("subscriptions"),
        }
    }

    /// Record that the subscription reward covered this channel.
    pub async fn mark_received(&self, user_id: u64, channel_id: i64) -> Result<()> {
        let record = ChannelReward {
            user_id,
            channel_id,
            bonus_received: true,
            received_at: chrono::Utc::now().timestamp(),
        };
        let filter = doc! { "user_id": user_id as i64, "channel_id": channel_id };
        self.collection
            .replace_one(filter, &record)
            .upsert(true)
            .await?;
        Ok(())
    }
}
