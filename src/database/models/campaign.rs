//! Broadcast campaign models (`notifications` collection).

use serde::{Deserialize, Serialize};

use super::{InlineButton, Language};

/// Who receives a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "language")]
pub enum Audience {
    All,
    Language(Language),
}

impl Audience {
    /// Parse the composer's callback suffix (`ru`, `en`, `all`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "all" => Some(Self::All),
            other => Language::from_code(other).map(Self::Language),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Language(lang) => lang.code(),
        }
    }
}

/// What gets sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignPayload {
    /// HTML text (message body, or photo caption).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Telegram file id of the photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Vec<InlineButton>>,
}

impl CampaignPayload {
    /// A payload needs at least text or a photo.
    pub fn is_empty(&self) -> bool {
        self.caption.as_deref().is_none_or(|c| c.trim().is_empty()) && self.photo.is_none()
    }
}

/// Campaign lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Created,
    Dispatching,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
        }
    }
}

/// Aggregate delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub sent: u64,
    pub failed: u64,
}

/// One administrator-initiated broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// UUID v4 string.
    pub campaign_id: String,
    pub payload: CampaignPayload,
    pub audience: Audience,
    pub status: CampaignStatus,
    pub created_by: u64,
    /// Unix timestamp.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CampaignSummary>,
}

impl Campaign {
    pub fn new(payload: CampaignPayload, audience: Audience, created_by: u64) -> Self {
        Self {
            campaign_id: uuid::Uuid::new_v4().to_string(),
            payload,
            audience,
            status: CampaignStatus::Created,
            created_by,
            created_at: chrono::Utc::now().timestamp(),
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_codes() {
        assert_eq!(Audience::from_code("all"), Some(Audience::All));
        assert_eq!(Audience::from_code("en"), Some(Audience::Language(Language::En)));
        assert_eq!(Audience::from_code("xx"), None);
        assert_eq!(Audience::Language(Language::Ru).code(), "ru");
    }

    #[test]
    fn empty_payload_detection() {
        assert!(CampaignPayload::default().is_empty());
        let blank = CampaignPayload {
            caption: Some("   ".into()),
            ..Default::default()
        };
        assert!(blank.is_empty());
        let photo_only = CampaignPayload {
            photo: Some("file".into()),
            ..Default::default()
        };
        assert!(!photo_only.is_empty());
    }

    #[test]
    fn new_campaign_starts_created() {
        let campaign = Campaign::new(CampaignPayload::default(), Audience::All, 1);
        assert_eq!(campaign.status, CampaignStatus::Created);
        assert!(uuid::Uuid::parse_str(&campaign.campaign_id).is_ok());
    }
}
