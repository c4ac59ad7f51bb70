//! Broadcast campaign storage (`notifications` collection).

use anyhow::Result;
use futures::StreamExt;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::database::models::{Campaign, CampaignStatus, CampaignSummary};

/// Repository for broadcast campaigns.
pub struct CampaignRepository {
    collection: Collection<Campaign>,
}

impl CampaignRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("notifications"),
        }
    }

    /// Persist a freshly confirmed campaign.
    pub async fn insert(&self, campaign: &Campaign) -> Result<()> {
        self.collection.insert_one(campaign).await?;
        info!(
            "Stored campaign {} for audience {}",
            campaign.campaign_id,
            campaign.audience.code()
        );
        Ok(())
    }

    pub async fn set_status(&self, campaign_id: &str, status: CampaignStatus) -> Result<()> {
        self.collection
            .update_one(
                doc! { "campaign_id": campaign_id },
                doc! { "$set": { "status": status.as_str() } },
            )
            .await?;
        debug!("Campaign {} is now {}", campaign_id, status.as_str());
        Ok(())
    }

    /// Mark the campaign completed and store its delivery summary.
    pub async fn complete(&self, campaign_id: &str, summary: CampaignSummary) -> Result<()> {
        self.collection
            .update_one(
                doc! { "campaign_id": campaign_id },
                doc! { "$set": {
                    "status": CampaignStatus::Completed.as_str(),
                    "summary": { "sent": summary.sent as i64, "failed": summary.failed as i64 },
                } },
            )
            .await?;
        Ok(())
    }

    /// Campaigns in the given status, oldest first.
    pub async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        let mut cursor = self
            .collection
            .find(doc! { "status": status.as_str() })
            .sort(doc! { "created_at": 1 })
            .await?;

        let mut campaigns = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => warn!("Skipping unreadable campaign: {}", e),
            }
        }

        Ok(campaigns)
    }
}
