//! Per-recipient delivery records (`messages` collection).

use anyhow::Result;
use async_trait::async_trait;
use mongodb::Collection;
use mongodb::bson::{Bson, doc};
use mongodb::options::ReturnDocument;

use crate::broadcast::DeliveryStore;
use crate::database::Database;
use crate::database::models::{DeliveryRecord, DeliveryStatus};

/// Repository for delivery records, keyed by `(campaign_id, user_id)`.
pub struct DeliveryRepository {
    collection: Collection<DeliveryRecord>,
}

impl DeliveryRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("messages"),
        }
    }
}

#[async_trait]
impl DeliveryStore for DeliveryRepository {
    async fn begin(&self, campaign_id: &str, user_id: u64) -> Result<bool> {
        let fresh = mongodb::bson::to_document(&DeliveryRecord::pending(campaign_id, user_id))?;
        let filter = doc! { "campaign_id": campaign_id, "user_id": user_id as i64 };

        let mut on_insert = fresh;
        on_insert.remove("campaign_id");
        on_insert.remove("user_id");

        let record = self
            .collection
            .find_one_and_update(filter, doc! { "$setOnInsert": on_insert })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        // A terminal record means an earlier run already handled this user.
        Ok(record.is_none_or(|r| !r.status.is_terminal()))
    }

    async fn finish(
        &self,
        campaign_id: &str,
        user_id: u64,
        status: DeliveryStatus,
        error: Option<String>,
    ) -> Result<()> {
        let filter = doc! {
            "campaign_id": campaign_id,
            "user_id": user_id as i64,
            "status": DeliveryStatus::Pending.as_str(),
        };
        let update = doc! { "$set": {
            "status": status.as_str(),
            "error": error.map_or(Bson::Null, Bson::String),
            "updated_at": chrono::Utc::now().timestamp(),
        } };

        self.collection.update_one(filter, update).await?;
        Ok(())
    }
}
