//! User ledger repository with cache-first reads.
//!
//! Every write goes straight to MongoDB (`$inc` / `$set`) and invalidates the
//! cached row, so cached reads never hide a grant.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::Collection;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::FindOptions;
use tokio::spawn;
use tracing::{debug, info, warn};

use super::Database;
use super::models::{Audience, Language, TaskKind, UserRecord};
use crate::cache::{CacheConfig, TypedCache};
use crate::services::Ledger;

const DAY_SECS: i64 = 86_400;

/// Numbers shown on the admin analytics screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStatistics {
    pub total_users: u64,
    /// Active within the last 7 days.
    pub active_users: u64,
    /// Registered within the last 7 days.
    pub new_users: u64,
    pub average_bonus: f64,
    pub total_bonus: i64,
    /// Users that came through a referral link.
    pub total_referrals: u64,
    /// Distinct referrers whose referrals were active within 30 days.
    pub active_referrers: u64,
    /// Completion count per task, in `TaskKind::ALL` order.
    pub tasks_completed: Vec<(TaskKind, u64)>,
}

/// Repository for the `users` collection.
pub struct UserRepo {
    collection: Collection<UserRecord>,
    cache_by_id: TypedCache<u64, UserRecord>,
}

impl UserRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
            cache_by_id: TypedCache::new("users_by_id", CacheConfig::user_profile()),
        }
    }

    /// Get user by ID.
    pub async fn get_by_id(&self, user_id: u64) -> Result<Option<UserRecord>> {
        if let Some(user) = self.cache_by_id.get(&user_id) {
            return Ok(Some(user));
        }

        let filter = doc! { "user_id": user_id as i64 };
        let result = self.collection.find_one(filter).await?;

        if let Some(user) = &result {
            self.cache_by_id.insert(user_id, user.clone());
        }

        Ok(result)
    }

    /// Look up the owner of a referral code.
    pub async fn get_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>> {
        let filter = doc! { "referral_code": code };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Insert the user unless the id is already registered.
    ///
    /// Returns the stored record and whether it was created by this call.
    pub async fn insert_if_absent(&self, user: UserRecord) -> Result<(UserRecord, bool)> {
        let mut fields = mongodb::bson::to_document(&user)?;
        fields.remove("user_id");

        let filter = doc! { "user_id": user.user_id as i64 };
        let update = doc! { "$setOnInsert": fields };
        let result = self.collection.update_one(filter, update).upsert(true).await?;
        let created = result.upserted_id.is_some();

        self.cache_by_id.invalidate(&user.user_id);
        if created {
            info!("Registered user {} (referer {:?})", user.user_id, user.referer_id);
            return Ok((user, true));
        }

        match self.get_by_id(user.user_id).await? {
            Some(existing) => Ok((existing, false)),
            None => bail!("user {} vanished right after upsert", user.user_id),
        }
    }

    /// Add points to a user. Only positive grants are accepted.
    pub async fn add_bonus(&self, user_id: u64, amount: i64) -> Result<()> {
        if amount <= 0 {
            bail!("refusing non-positive bonus {} for user {}", amount, user_id);
        }

        let filter = doc! { "user_id": user_id as i64 };
        let update = doc! { "$inc": { "bonus_points": amount } };
        self.collection.update_one(filter, update).await?;
        self.cache_by_id.invalidate(&user_id);

        info!("Granted {} bonus points to user {}", amount, user_id);
        Ok(())
    }

    pub async fn mark_bonus_awarded(&self, user_id: u64) -> Result<()> {
        self.set_field(user_id, "bonus_awarded", Bson::Boolean(true)).await
    }

    pub async fn mark_task_completed(&self, user_id: u64, task: TaskKind) -> Result<()> {
        self.set_field(user_id, task.field(), Bson::Boolean(true)).await?;
        info!("Task {:?} marked completed for user {}", task, user_id);
        Ok(())
    }

    pub async fn set_language(&self, user_id: u64, language: Language) -> Result<()> {
        self.set_field(user_id, "language", Bson::String(language.code().to_string()))
            .await
    }

    /// Refresh `last_activity` and the username in one write.
    pub async fn touch(&self, user_id: u64, tg_name: Option<String>) -> Result<()> {
        let mut set = doc! { "last_activity": chrono::Utc::now().timestamp() };
        if let Some(name) = tg_name {
            set.insert("tg_name", name);
        }

        let filter = doc! { "user_id": user_id as i64 };
        self.collection.update_one(filter, doc! { "$set": set }).await?;
        self.cache_by_id.invalidate(&user_id);
        Ok(())
    }

    /// Touch activity in background (non-blocking).
    pub fn touch_background(self: Arc<Self>, user_id: u64, tg_name: Option<String>) {
        spawn(async move {
            if let Err(e) = self.touch(user_id, tg_name).await {
                warn!("Failed to update activity for user {}: {}", user_id, e);
            }
        });
    }

    async fn set_field(&self, user_id: u64, field: &str, value: Bson) -> Result<()> {
        let filter = doc! { "user_id": user_id as i64 };
        let update = doc! { "$set": { field: value } };
        self.collection.update_one(filter, update).await?;
        self.cache_by_id.invalidate(&user_id);
        debug!("Updated {} for user {}", field, user_id);
        Ok(())
    }

    /// Number of users registered through this user's link.
    pub async fn count_referrals(&self, user_id: u64) -> Result<u64> {
        let filter = doc! { "referer_id": user_id as i64 };
        Ok(self.collection.count_documents(filter).await?)
    }

    /// Leaderboard, highest balance first.
    pub async fn top_users(&self, limit: i64) -> Result<Vec<UserRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "bonus_points": -1, "user_id": 1 })
            .limit(limit)
            .build();
        self.collect(doc! {}, options).await
    }

    /// One page of the admin user list, oldest registration first.
    /// An offset past the end yields an empty page.
    pub async fn page(&self, offset: u64, limit: u64) -> Result<Vec<UserRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "registration_date": 1, "user_id": 1 })
            .skip(offset.min(i64::MAX as u64))
            .limit(limit as i64)
            .build();
        self.collect(doc! {}, options).await
    }

    /// Every user, oldest registration first (admin export).
    pub async fn all(&self) -> Result<Vec<UserRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "registration_date": 1, "user_id": 1 })
            .build();
        let users = self.collect(doc! {}, options).await?;
        debug!("Loaded {} users for export", users.len());
        Ok(users)
    }

    async fn collect(&self, filter: Document, options: FindOptions) -> Result<Vec<UserRecord>> {
        let mut cursor = self.collection.find(filter).with_options(options).await?;
        let mut users = Vec::new();

        while let Some(result) = cursor.next().await {
            match result {
                Ok(user) => users.push(user),
                Err(e) => warn!("Skipping unreadable user document: {}", e),
            }
        }

        Ok(users)
    }

    /// Recipient ids for a broadcast audience.
    pub async fn audience_ids(&self, audience: Audience) -> Result<Vec<u64>> {
        let filter = match audience {
            Audience::All => doc! {},
            Audience::Language(lang) => doc! { "language": lang.code() },
        };

        let raw_coll: Collection<Document> = self.collection.clone_with_type();
        let options = FindOptions::builder()
            .projection(doc! { "user_id": 1, "_id": 0 })
            .build();

        let mut cursor = raw_coll.find(filter).with_options(options).await?;
        let mut ids = Vec::new();

        while let Some(result) = cursor.next().await {
            if let Ok(doc) = result
                && let Ok(id) = doc.get_i64("user_id")
            {
                ids.push(id as u64);
            }
        }

        debug!("Resolved {} recipients for audience {}", ids.len(), audience.code());
        Ok(ids)
    }

    /// Aggregate numbers for the analytics screen.
    pub async fn statistics(&self) -> Result<UserStatistics> {
        let now = chrono::Utc::now().timestamp();
        let week_ago = now - 7 * DAY_SECS;
        let month_ago = now - 30 * DAY_SECS;

        let total_users = self.collection.count_documents(doc! {}).await?;
        let active_users = self
            .collection
            .count_documents(doc! { "last_activity": { "$gte": week_ago } })
            .await?;
        let new_users = self
            .collection
            .count_documents(doc! { "registration_date": { "$gte": week_ago } })
            .await?;
        let total_referrals = self
            .collection
            .count_documents(doc! { "referer_id": { "$ne": Bson::Null, "$exists": true } })
            .await?;
        let active_referrers = self
            .collection
            .distinct(
                "referer_id",
                doc! { "referer_id": { "$ne": Bson::Null, "$exists": true }, "last_activity": { "$gte": month_ago } },
            )
            .await?
            .len() as u64;

        let mut totals = self
            .collection
            .aggregate(vec![doc! {
                "$group": {
                    "_id": Bson::Null,
                    "total": { "$sum": "$bonus_points" },
                    "average": { "$avg": "$bonus_points" },
                }
            }])
            .await?;

        let (total_bonus, average_bonus) = match totals.next().await {
            Some(Ok(doc)) => (
                numeric_i64(doc.get("total")),
                doc.get_f64("average").unwrap_or(0.0),
            ),
            _ => (0, 0.0),
        };

        let mut tasks_completed = Vec::with_capacity(TaskKind::ALL.len());
        for task in TaskKind::ALL {
            let count = self
                .collection
                .count_documents(doc! { task.field(): true })
                .await?;
            tasks_completed.push((task, count));
        }

        Ok(UserStatistics {
            total_users,
            active_users,
            new_users,
            average_bonus,
            total_bonus,
            total_referrals,
            active_referrers,
            tasks_completed,
        })
    }
}

/// `$sum` yields Int32 or Int64 depending on magnitude.
fn numeric_i64(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

#[async_trait]
impl Ledger for UserRepo {
    async fn get_user(&self, user_id: u64) -> Result<Option<UserRecord>> {
        self.get_by_id(user_id).await
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>> {
        self.get_by_referral_code(code).await
    }

    async fn register(&self, user: UserRecord) -> Result<(UserRecord, bool)> {
        self.insert_if_absent(user).await
    }

    async fn add_bonus(&self, user_id: u64, amount: i64) -> Result<()> {
        UserRepo::add_bonus(self, user_id, amount).await
    }

    async fn mark_bonus_awarded(&self, user_id: u64) -> Result<()> {
        UserRepo::mark_bonus_awarded(self, user_id).await
    }

    async fn mark_task_completed(&self, user_id: u64, task: TaskKind) -> Result<()> {
        UserRepo::mark_task_completed(self, user_id, task).await
    }

    async fn count_referrals(&self, user_id: u64) -> Result<u64> {
        UserRepo::count_referrals(self, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_sum_accepts_every_width() {
        assert_eq!(numeric_i64(Some(&Bson::Int32(5))), 5);
        assert_eq!(numeric_i64(Some(&Bson::Int64(7_000_000_000))), 7_000_000_000);
        assert_eq!(numeric_i64(Some(&Bson::Double(3.9))), 3);
        assert_eq!(numeric_i64(None), 0);
    }
}
