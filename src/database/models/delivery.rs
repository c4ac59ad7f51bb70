//! Per-recipient delivery records (`messages` collection).

use serde::{Deserialize, Serialize};

/// Delivery state of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Stored delivery record, keyed by `(campaign_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub campaign_id: String,
    pub user_id: u64,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp.
    pub created_at: i64,
    /// Unix timestamp.
    pub updated_at: i64,
}

impl DeliveryRecord {
    pub fn pending(campaign_id: &str, user_id: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            campaign_id: campaign_id.to_string(),
            user_id,
            status: DeliveryStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
