//! Chat boosts reported by Telegram (`chat_boosts` collection).

use anyhow::Result;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::debug;

use crate::database::Database;
use crate::database::models::ChatBoostRecord;

pub struct BoostRepository {
    collection: Collection<ChatBoostRecord>,
}

impl BoostRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("chat_boosts"),
        }
    }

    /// Store the latest boost of a user in a chat (upsert).
    pub async fn save(&self, record: &ChatBoostRecord) -> Result<()> {
        let filter = doc! { "user_id": record.user_id as i64, "chat_id": record.chat_id };
        self.collection
            .replace_one(filter, record)
            .upsert(true)
            .await?;
        debug!("Saved boost {} of user {} in chat {}", record.boost_id, record.user_id, record.chat_id);
        Ok(())
    }

    /// Drop a boost Telegram reported as removed.
    pub async fn remove(&self, chat_id: i64, boost_id: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "chat_id": chat_id, "boost_id": boost_id })
            .await?;
        Ok(())
    }

    /// Whether a stored, unexpired boost exists.
    pub async fn has_active(&self, user_id: u64, chat_id: i64) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let filter = doc! {
            "user_id": user_id as i64,
            "chat_id": chat_id,
            "expiration_date": { "$gt": now },
        };
        Ok(self.collection.count_documents(filter).await? > 0)
    }
}
