//! Campaign dispatch: the per-recipient loop and the background worker pool.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{BroadcastSender, DeliveryStore, Pacer, SendError};
use crate::config::BroadcastConfig;
use crate::database::{
    Campaign, CampaignPayload, CampaignRepository, CampaignStatus, CampaignSummary, DeliveryStatus,
    UserRepo,
};
use crate::i18n::{ADMIN_LANGUAGE, t};

/// Deliver one campaign to every recipient, in order.
///
/// A rate-limited send is retried exactly once after the server-provided
/// delay; any other failure, or a failed retry, marks the recipient failed.
pub async fn run_campaign(
    campaign_id: &str,
    payload: &CampaignPayload,
    recipients: &[u64],
    sender: &dyn BroadcastSender,
    store: &dyn DeliveryStore,
    pacer: &mut Pacer,
) -> CampaignSummary {
    let mut summary = CampaignSummary::default();

    for (index, &user_id) in recipients.iter().enumerate() {
        if index > 0 {
            sleep(pacer.delay()).await;
        }

        match store.begin(campaign_id, user_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Recipient {} of {} already settled", user_id, campaign_id);
                continue;
            }
            Err(e) => {
                warn!("Cannot record delivery to {} for {}: {}", user_id, campaign_id, e);
                summary.failed += 1;
                continue;
            }
        }

        let (status, error) = match deliver_with_retry(sender, user_id, payload, pacer).await {
            Ok(()) => {
                pacer.on_success();
                summary.sent += 1;
                (DeliveryStatus::Sent, None)
            }
            Err(e) => {
                debug!("Delivery to {} failed: {}", user_id, e);
                summary.failed += 1;
                (DeliveryStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = store.finish(campaign_id, user_id, status, error).await {
            warn!("Cannot settle delivery to {} for {}: {}", user_id, campaign_id, e);
        }
    }

    summary
}

async fn deliver_with_retry(
    sender: &dyn BroadcastSender,
    user_id: u64,
    payload: &CampaignPayload,
    pacer: &mut Pacer,
) -> Result<(), SendError> {
    match sender.deliver(user_id, payload).await {
        Err(SendError::RetryAfter(wait)) => {
            pacer.on_rate_limit();
            debug!("Rate limited on {}, retrying in {:?}", user_id, wait);
            sleep(wait).await;
            sender.deliver(user_id, payload).await
        }
        other => other,
    }
}

/// Everything a worker needs to take a campaign from queue to summary.
pub struct BroadcastContext {
    pub sender: Arc<dyn BroadcastSender>,
    pub store: Arc<dyn DeliveryStore>,
    pub campaigns: Arc<CampaignRepository>,
    pub users: Arc<UserRepo>,
    pub admin_ids: Vec<u64>,
    pub config: BroadcastConfig,
}

impl BroadcastContext {
    async fn dispatch(&self, campaign: Campaign) -> Result<()> {
        let id = campaign.campaign_id.as_str();
        self.campaigns.set_status(id, CampaignStatus::Dispatching).await?;

        let recipients = self.users.audience_ids(campaign.audience).await?;
        info!("Dispatching campaign {} to {} recipients", id, recipients.len());

        let mut pacer = Pacer::new(self.config.min_delay, self.config.max_delay);
        let summary = run_campaign(
            id,
            &campaign.payload,
            &recipients,
            self.sender.as_ref(),
            self.store.as_ref(),
            &mut pacer,
        )
        .await;

        self.campaigns.complete(id, summary).await?;
        info!(
            "Campaign {} completed: {} sent, {} failed",
            id, summary.sent, summary.failed
        );

        let text = t(
            ADMIN_LANGUAGE,
            "admin.campaign_done",
            &[
                ("campaign", id),
                ("sent", &summary.sent.to_string()),
                ("failed", &summary.failed.to_string()),
            ],
        );
        for &admin in &self.admin_ids {
            if let Err(e) = self.sender.notify(admin, &text).await {
                warn!("Failed to notify admin {}: {}", admin, e);
            }
        }

        Ok(())
    }
}

/// Handle used by the composer to hand campaigns to the worker pool.
#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::UnboundedSender<Campaign>,
}

impl BroadcastQueue {
    /// Spawn `workers` tasks sharing one receiver.
    pub fn start(ctx: Arc<BroadcastContext>, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Campaign>();
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            tokio::spawn(worker_loop(worker, Arc::clone(&rx), Arc::clone(&ctx)));
        }

        info!("Started {} broadcast workers", workers.max(1));
        Self { tx }
    }

    pub fn enqueue(&self, campaign: Campaign) -> Result<()> {
        let id = campaign.campaign_id.clone();
        self.tx
            .send(campaign)
            .map_err(|_| anyhow!("broadcast workers are gone"))?;
        debug!("Enqueued campaign {}", id);
        Ok(())
    }

    /// Re-enqueue campaigns persisted but never started; report orphans.
    pub async fn resume(&self, campaigns: &CampaignRepository) -> Result<usize> {
        for orphan in campaigns.list_by_status(CampaignStatus::Dispatching).await? {
            warn!(
                "Campaign {} was interrupted while dispatching and is left as is",
                orphan.campaign_id
            );
        }

        let pending = campaigns.list_by_status(CampaignStatus::Created).await?;
        let count = pending.len();
        for campaign in pending {
            self.enqueue(campaign)?;
        }

        if count > 0 {
            info!("Re-enqueued {} campaigns", count);
        }
        Ok(count)
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Campaign>>>,
    ctx: Arc<BroadcastContext>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(campaign) = next else {
            debug!("Broadcast worker {} stopping", worker);
            break;
        };

        let id = campaign.campaign_id.clone();
        if let Err(e) = ctx.dispatch(campaign).await {
            error!("Campaign {} failed on worker {}: {}", id, worker, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    const BLOCKED: u64 = 1;
    const LIMITED: u64 = 2;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Attempt(u64),
        Settled(u64, DeliveryStatus),
    }

    #[derive(Default)]
    struct Journal {
        events: StdMutex<Vec<Event>>,
        records: StdMutex<HashMap<u64, DeliveryStatus>>,
        limited_once: StdMutex<bool>,
    }

    impl Journal {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BroadcastSender for Journal {
        async fn deliver(&self, user_id: u64, _payload: &CampaignPayload) -> Result<(), SendError> {
            self.events.lock().unwrap().push(Event::Attempt(user_id));
            match user_id {
                BLOCKED => Err(SendError::Permanent("bot blocked by user".into())),
                LIMITED => {
                    let mut limited = self.limited_once.lock().unwrap();
                    if *limited {
                        Ok(())
                    } else {
                        *limited = true;
                        Err(SendError::RetryAfter(Duration::from_secs(2)))
                    }
                }
                _ => Ok(()),
            }
        }

        async fn notify(&self, _user_id: u64, _text: &str) -> Result<(), SendError> {
            Ok(())
        }
    }

    #[async_trait]
    impl DeliveryStore for Journal {
        async fn begin(&self, _campaign_id: &str, user_id: u64) -> Result<bool> {
            let mut records = self.records.lock().unwrap();
            let status = records.entry(user_id).or_insert(DeliveryStatus::Pending);
            Ok(!status.is_terminal())
        }

        async fn finish(
            &self,
            _campaign_id: &str,
            user_id: u64,
            status: DeliveryStatus,
            _error: Option<String>,
        ) -> Result<()> {
            self.records.lock().unwrap().insert(user_id, status);
            self.events.lock().unwrap().push(Event::Settled(user_id, status));
            Ok(())
        }
    }

    fn pacer() -> Pacer {
        Pacer::new(Duration::from_millis(50), Duration::from_millis(1000))
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_and_rate_limited_recipients() {
        let journal = Journal::default();
        let recipients = [BLOCKED, LIMITED, 3, 4];
        let mut pacer = pacer();
        let started = Instant::now();

        let summary = run_campaign(
            "c1",
            &CampaignPayload::default(),
            &recipients,
            &journal,
            &journal,
            &mut pacer,
        )
        .await;

        assert_eq!(summary, CampaignSummary { sent: 3, failed: 1 });
        assert!(started.elapsed() >= Duration::from_secs(2));

        let records = journal.records.lock().unwrap().clone();
        assert_eq!(records[&BLOCKED], DeliveryStatus::Failed);
        assert_eq!(records[&LIMITED], DeliveryStatus::Sent);

        // The limited recipient is settled only after its second attempt.
        let events = journal.events();
        let limited: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::Attempt(LIMITED) | Event::Settled(LIMITED, _)))
            .cloned()
            .collect();
        assert_eq!(
            limited,
            vec![
                Event::Attempt(LIMITED),
                Event::Attempt(LIMITED),
                Event::Settled(LIMITED, DeliveryStatus::Sent),
            ]
        );

        // Blocked users are never retried.
        assert_eq!(
            events.iter().filter(|e| **e == Event::Attempt(BLOCKED)).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_failure_is_recorded_failed() {
        struct AlwaysLimited;

        #[async_trait]
        impl BroadcastSender for AlwaysLimited {
            async fn deliver(&self, _: u64, _: &CampaignPayload) -> Result<(), SendError> {
                Err(SendError::RetryAfter(Duration::from_secs(1)))
            }

            async fn notify(&self, _: u64, _: &str) -> Result<(), SendError> {
                Ok(())
            }
        }

        let journal = Journal::default();
        let mut pacer = pacer();
        let summary = run_campaign(
            "c2",
            &CampaignPayload::default(),
            &[7],
            &AlwaysLimited,
            &journal,
            &mut pacer,
        )
        .await;

        assert_eq!(summary, CampaignSummary { sent: 0, failed: 1 });
        assert_eq!(journal.records.lock().unwrap()[&7], DeliveryStatus::Failed);
        assert_eq!(pacer.delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn settled_recipients_are_skipped() {
        let journal = Journal::default();
        journal.records.lock().unwrap().insert(3, DeliveryStatus::Sent);
        let mut pacer = pacer();

        let summary = run_campaign(
            "c3",
            &CampaignPayload::default(),
            &[3, 4],
            &journal,
            &journal,
            &mut pacer,
        )
        .await;

        assert_eq!(summary, CampaignSummary { sent: 1, failed: 0 });
        assert!(!journal.events().contains(&Event::Attempt(3)));
    }

    #[tokio::test]
    async fn empty_audience_completes_immediately() {
        let journal = Journal::default();
        let mut pacer = pacer();
        let summary = run_campaign(
            "c4",
            &CampaignPayload::default(),
            &[],
            &journal,
            &journal,
            &mut pacer,
        )
        .await;
        assert_eq!(summary, CampaignSummary::default());
    }
}
