//! Global bot settings (`settings` collection, single document).

use std::time::Duration;

use anyhow::{Result, bail};
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::info;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::{BotSettings, ReferralRewards, SETTINGS_ID};

pub struct SettingsRepository {
    collection: Collection<BotSettings>,
    cache: TypedCache<&'static str, BotSettings>,
}

impl SettingsRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("settings"),
            cache: TypedCache::new(
                "settings",
                CacheConfig::with_capacity(1).ttl(Duration::from_secs(60)),
            ),
        }
    }

    /// Current settings, falling back to defaults when none are stored.
    pub async fn get(&self) -> Result<BotSettings> {
        if let Some(settings) = self.cache.get(&SETTINGS_ID) {
            return Ok(settings);
        }

        let settings = self
            .collection
            .find_one(doc! { "_id": SETTINGS_ID })
            .await?
            .unwrap_or_default();

        self.cache.insert(SETTINGS_ID, settings.clone());
        Ok(settings)
    }

    pub async fn referral_rewards(&self) -> Result<ReferralRewards> {
        Ok(self.get().await?.referral)
    }

    /// Replace both referral bonus amounts.
    pub async fn update_referral_rewards(&self, rewards: ReferralRewards) -> Result<()> {
        if rewards.referrer_bonus <= 0 || rewards.referee_bonus <= 0 {
            bail!("referral bonuses must be positive");
        }

        self.collection
            .update_one(
                doc! { "_id": SETTINGS_ID },
                doc! { "$set": {
                    "referrer_bonus": rewards.referrer_bonus,
                    "referee_bonus": rewards.referee_bonus,
                } },
            )
            .upsert(true)
            .await?;

        self.cache.invalidate(&SETTINGS_ID);
        info!(
            "Referral bonuses set to {} / {}",
            rewards.referrer_bonus, rewards.referee_bonus
        );
        Ok(())
    }
}
