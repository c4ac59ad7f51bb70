//! Per-recipient delivery bookkeeping seam.

use anyhow::Result;
use async_trait::async_trait;

use crate::database::DeliveryStatus;

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Write the `pending` record for a recipient (idempotent).
    ///
    /// Returns `false` when an earlier run already settled this recipient.
    async fn begin(&self, campaign_id: &str, user_id: u64) -> Result<bool>;

    /// Move a pending record to its terminal status.
    async fn finish(
        &self,
        campaign_id: &str,
        user_id: u64,
        status: DeliveryStatus,
        error: Option<String>,
    ) -> Result<()>;
}
