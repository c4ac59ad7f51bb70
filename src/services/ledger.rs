//! User ledger seam.
//!
//! Task and referral logic talk to storage only through this trait, so they
//! can be exercised against an in-memory ledger in tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::database::{TaskKind, UserRecord};

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_user(&self, user_id: u64) -> Result<Option<UserRecord>>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>>;

    /// Insert unless already registered. Returns the stored record and
    /// whether this call created it.
    async fn register(&self, user: UserRecord) -> Result<(UserRecord, bool)>;

    /// Increase a balance. Non-positive amounts are rejected.
    async fn add_bonus(&self, user_id: u64, amount: i64) -> Result<()>;

    async fn mark_bonus_awarded(&self, user_id: u64) -> Result<()>;

    async fn mark_task_completed(&self, user_id: u64, task: TaskKind) -> Result<()>;

    async fn count_referrals(&self, user_id: u64) -> Result<u64>;
}
