//! Task engine: completion predicates and one-time grants.
//!
//! Each task is checked against its predicate, then granted and marked.
//! Grant-then-mark is not transactional; a crash between the two writes can
//! re-open a task that was already paid, never the other way round.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use super::{Ledger, MembershipChecker};
use crate::database::{TaskFlags, TaskKind};

/// Referrals needed for the invite task.
pub const INVITE_THRESHOLD: u64 = 5;

/// Result of a task check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Granted { reward: i64 },
    AlreadyCompleted,
    NotEligible,
}

/// Static task parameters taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct TaskRules {
    /// Case-insensitive substring the display name must contain.
    pub name_marker: String,
    /// Channels that make up the subscription bundle.
    pub channels: Vec<i64>,
    /// Chat whose boosters earn the boost reward.
    pub boost_chat_id: Option<i64>,
}

pub struct TaskEngine {
    ledger: Arc<dyn Ledger>,
    membership: Arc<dyn MembershipChecker>,
    rules: TaskRules,
}

impl TaskEngine {
    pub fn new(ledger: Arc<dyn Ledger>, membership: Arc<dyn MembershipChecker>, rules: TaskRules) -> Self {
        Self {
            ledger,
            membership,
            rules,
        }
    }

    /// Completion flags of a user; unknown users have none.
    pub async fn board(&self, user_id: u64) -> Result<TaskFlags> {
        Ok(self
            .ledger
            .get_user(user_id)
            .await?
            .map(|u| u.tasks)
            .unwrap_or_default())
    }

    /// Display name contains the configured marker.
    pub async fn check_name(&self, user_id: u64, display_name: &str) -> Result<TaskOutcome> {
        let marker = self.rules.name_marker.to_lowercase();
        let eligible = !marker.is_empty() && display_name.to_lowercase().contains(&marker);
        self.settle(user_id, TaskKind::Name, || async move { Ok(eligible) })
            .await
    }

    /// Member of every configured channel.
    pub async fn check_subscription(&self, user_id: u64) -> Result<TaskOutcome> {
        self.settle(user_id, TaskKind::Subscribe, || async move {
            if self.rules.channels.is_empty() {
                return Ok(false);
            }
            Ok(self.channel_statuses(user_id).await.iter().all(|(_, ok)| *ok))
        })
        .await
    }

    /// At least `INVITE_THRESHOLD` referrals. Also returns the current count.
    pub async fn check_invite(&self, user_id: u64) -> Result<(TaskOutcome, u64)> {
        let count = self.ledger.count_referrals(user_id).await?;
        let outcome = self
            .settle(user_id, TaskKind::Invite, || async move { Ok(count >= INVITE_THRESHOLD) })
            .await?;
        Ok((outcome, count))
    }

    /// Holds an active boost of the boost chat.
    pub async fn check_boost(&self, user_id: u64) -> Result<TaskOutcome> {
        self.settle(user_id, TaskKind::Boost, || async move {
            let Some(chat_id) = self.rules.boost_chat_id else {
                return Ok(false);
            };
            Ok(match self.membership.has_boost(chat_id, user_id).await {
                Ok(boosted) => boosted,
                Err(e) => {
                    warn!("Boost lookup failed for user {}: {}", user_id, e);
                    false
                }
            })
        })
        .await
    }

    /// Per-channel membership, failing closed on lookup errors.
    pub async fn channel_statuses(&self, user_id: u64) -> Vec<(i64, bool)> {
        let mut statuses = Vec::with_capacity(self.rules.channels.len());
        for &chat_id in &self.rules.channels {
            let subscribed = match self.membership.is_member(chat_id, user_id).await {
                Ok(subscribed) => subscribed,
                Err(e) => {
                    warn!("Membership lookup failed for user {} in {}: {}", user_id, chat_id, e);
                    false
                }
            };
            statuses.push((chat_id, subscribed));
        }
        statuses
    }

    async fn settle<F, Fut>(&self, user_id: u64, task: TaskKind, predicate: F) -> Result<TaskOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let Some(user) = self.ledger.get_user(user_id).await? else {
            return Ok(TaskOutcome::NotEligible);
        };

        if user.tasks.is_completed(task) {
            return Ok(TaskOutcome::AlreadyCompleted);
        }

        if !predicate().await? {
            return Ok(TaskOutcome::NotEligible);
        }

        let reward = task.reward();
        self.ledger.add_bonus(user_id, reward).await?;
        self.ledger.mark_task_completed(user_id, task).await?;

        info!("User {} completed task {:?} (+{})", user_id, task, reward);
        Ok(TaskOutcome::Granted { reward })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::UserRecord;
    use crate::services::testing::{FakeMembership, MemoryLedger};

    fn engine(ledger: Arc<MemoryLedger>, membership: FakeMembership) -> TaskEngine {
        TaskEngine::new(
            ledger,
            Arc::new(membership),
            TaskRules {
                name_marker: "clown".to_string(),
                channels: vec![-100, -200],
                boost_chat_id: Some(-300),
            },
        )
    }

    #[tokio::test]
    async fn name_task_grants_once() {
        let ledger = Arc::new(MemoryLedger::with_users([UserRecord::new(1, None, None)]));
        let engine = engine(ledger.clone(), FakeMembership::default());

        assert_eq!(
            engine.check_name(1, "Big CLOWN energy").await.unwrap(),
            TaskOutcome::Granted { reward: 2500 }
        );
        assert_eq!(
            engine.check_name(1, "Big CLOWN energy").await.unwrap(),
            TaskOutcome::AlreadyCompleted
        );
        assert_eq!(ledger.balance(1), 2500);
    }

    #[tokio::test]
    async fn name_without_marker_is_not_eligible() {
        let ledger = Arc::new(MemoryLedger::with_users([UserRecord::new(1, None, None)]));
        let engine = engine(ledger.clone(), FakeMembership::default());

        assert_eq!(engine.check_name(1, "Alice").await.unwrap(), TaskOutcome::NotEligible);
        assert_eq!(ledger.balance(1), 0);
    }

    #[tokio::test]
    async fn subscription_needs_every_channel() {
        let ledger = Arc::new(MemoryLedger::with_users([UserRecord::new(1, None, None)]));
        let membership = FakeMembership::default().member_of(-100, 1);
        let engine = engine(ledger.clone(), membership);

        assert_eq!(engine.check_subscription(1).await.unwrap(), TaskOutcome::NotEligible);
        assert_eq!(engine.channel_statuses(1).await, vec![(-100, true), (-200, false)]);
    }

    #[tokio::test]
    async fn subscription_lookup_errors_fail_closed() {
        let ledger = Arc::new(MemoryLedger::with_users([UserRecord::new(1, None, None)]));
        let membership = FakeMembership::default().member_of(-100, 1).failing();
        let engine = engine(ledger.clone(), membership);

        assert_eq!(engine.check_subscription(1).await.unwrap(), TaskOutcome::NotEligible);
        assert_eq!(engine.check_boost(1).await.unwrap(), TaskOutcome::NotEligible);
        assert_eq!(ledger.balance(1), 0);
    }

    #[tokio::test]
    async fn subscription_bundle_pays_once() {
        let ledger = Arc::new(MemoryLedger::with_users([UserRecord::new(1, None, None)]));
        let membership = FakeMembership::default().member_of(-100, 1).member_of(-200, 1);
        let engine = engine(ledger.clone(), membership);

        assert_eq!(
            engine.check_subscription(1).await.unwrap(),
            TaskOutcome::Granted { reward: 2000 }
        );
        assert_eq!(engine.check_subscription(1).await.unwrap(), TaskOutcome::AlreadyCompleted);
        assert_eq!(ledger.balance(1), 2000);
        assert!(engine.board(1).await.unwrap().subscribe);
    }

    #[tokio::test]
    async fn invite_threshold() {
        let mut users = vec![UserRecord::new(1, None, None)];
        users.extend((10..14).map(|id| UserRecord::new(id, Some(1), None)));
        let ledger = Arc::new(MemoryLedger::with_users(users));
        let engine = engine(ledger.clone(), FakeMembership::default());

        assert_eq!(engine.check_invite(1).await.unwrap(), (TaskOutcome::NotEligible, 4));

        ledger.insert(UserRecord::new(14, Some(1), None));
        assert_eq!(
            engine.check_invite(1).await.unwrap(),
            (TaskOutcome::Granted { reward: 1000 }, 5)
        );
        assert_eq!(engine.check_invite(1).await.unwrap().0, TaskOutcome::AlreadyCompleted);
    }

    #[tokio::test]
    async fn boost_task() {
        let ledger = Arc::new(MemoryLedger::with_users([
            UserRecord::new(1, None, None),
            UserRecord::new(2, None, None),
        ]));
        let engine = engine(ledger.clone(), FakeMembership::default().booster_of(-300, 1));

        assert_eq!(engine.check_boost(1).await.unwrap(), TaskOutcome::Granted { reward: 2500 });
        assert_eq!(engine.check_boost(2).await.unwrap(), TaskOutcome::NotEligible);
    }

    #[tokio::test]
    async fn unknown_user_is_not_eligible() {
        let ledger = Arc::new(MemoryLedger::default());
        let engine = engine(ledger, FakeMembership::default());
        assert_eq!(engine.check_name(9, "clown").await.unwrap(), TaskOutcome::NotEligible);
    }
}
