//! Registration through `/start [code]` and the one-time referral bonus.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use super::Ledger;
use crate::database::{ReferralRewards, UserRecord};

/// What `/start` did for a user.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: UserRecord,
    pub is_new: bool,
    /// Referrer paid by this call, if any.
    pub rewarded_referrer: Option<u64>,
}

pub struct ReferralService {
    ledger: Arc<dyn Ledger>,
}

impl ReferralService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Resolve a referral code to its owner, ignoring unknown codes and the
    /// user's own code.
    pub async fn resolve_referrer(&self, user_id: u64, code: Option<&str>) -> Result<Option<u64>> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        let referrer = self
            .ledger
            .find_by_referral_code(code)
            .await?
            .map(|u| u.user_id)
            .filter(|id| *id != user_id);

        if referrer.is_none() {
            debug!("Ignoring referral code {:?} for user {}", code, user_id);
        }
        Ok(referrer)
    }

    /// Register the user if new and pay the referral bonus at most once.
    ///
    /// The referrer is stored only for new users; an existing user keeps
    /// whatever referrer they registered with.
    pub async fn register(
        &self,
        user_id: u64,
        tg_name: Option<String>,
        code: Option<&str>,
        rewards: ReferralRewards,
    ) -> Result<Registration> {
        let referrer = self.resolve_referrer(user_id, code).await?;
        let (user, is_new) = self
            .ledger
            .register(UserRecord::new(user_id, referrer, tg_name))
            .await?;

        let mut rewarded_referrer = None;
        if let Some(referer_id) = user.referer_id
            && !user.bonus_awarded
        {
            self.ledger.add_bonus(referer_id, rewards.referrer_bonus).await?;
            self.ledger.add_bonus(user_id, rewards.referee_bonus).await?;
            self.ledger.mark_bonus_awarded(user_id).await?;

            info!(
                "Referral bonus paid: {} (+{}) referred {} (+{})",
                referer_id, rewards.referrer_bonus, user_id, rewards.referee_bonus
            );
            rewarded_referrer = Some(referer_id);
        }

        let user = match rewarded_referrer {
            Some(_) => self.ledger.get_user(user_id).await?.unwrap_or(user),
            None => user,
        };

        Ok(Registration {
            user,
            is_new,
            rewarded_referrer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryLedger;

    fn referrer() -> UserRecord {
        let mut user = UserRecord::new(1, None, None);
        user.referral_code = "ref-one".to_string();
        user
    }

    #[tokio::test]
    async fn new_user_with_code_pays_both_once() {
        let ledger = Arc::new(MemoryLedger::with_users([referrer()]));
        let service = ReferralService::new(ledger.clone());
        let rewards = ReferralRewards::default();

        let first = service.register(2, None, Some("ref-one"), rewards).await.unwrap();
        assert!(first.is_new);
        assert_eq!(first.rewarded_referrer, Some(1));
        assert_eq!(first.user.referer_id, Some(1));
        assert!(first.user.bonus_awarded);
        assert_eq!(ledger.balance(1), 300);
        assert_eq!(ledger.balance(2), 100);

        let second = service.register(2, None, Some("ref-one"), rewards).await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.rewarded_referrer, None);
        assert_eq!(ledger.balance(1), 300);
        assert_eq!(ledger.balance(2), 100);
    }

    #[tokio::test]
    async fn unknown_or_own_code_is_ignored() {
        let ledger = Arc::new(MemoryLedger::with_users([referrer()]));
        let service = ReferralService::new(ledger.clone());
        let rewards = ReferralRewards::default();

        let reg = service.register(3, None, Some("missing"), rewards).await.unwrap();
        assert_eq!(reg.user.referer_id, None);
        assert_eq!(ledger.balance(3), 0);

        let own = service.register(1, None, Some("ref-one"), rewards).await.unwrap();
        assert!(!own.is_new);
        assert_eq!(own.rewarded_referrer, None);
        assert_eq!(ledger.balance(1), 0);
    }

    #[tokio::test]
    async fn existing_user_cannot_gain_a_referrer() {
        let ledger = Arc::new(MemoryLedger::with_users([referrer(), UserRecord::new(5, None, None)]));
        let service = ReferralService::new(ledger.clone());

        let reg = service
            .register(5, None, Some("ref-one"), ReferralRewards::default())
            .await
            .unwrap();
        assert_eq!(reg.user.referer_id, None);
        assert_eq!(ledger.balance(1), 0);
    }

    #[tokio::test]
    async fn configured_amounts_are_used() {
        let ledger = Arc::new(MemoryLedger::with_users([referrer()]));
        let service = ReferralService::new(ledger.clone());
        let rewards = ReferralRewards {
            referrer_bonus: 50,
            referee_bonus: 10,
        };

        service.register(2, None, Some("ref-one"), rewards).await.unwrap();
        assert_eq!(ledger.balance(1), 50);
        assert_eq!(ledger.balance(2), 10);
    }
}
