//! Outbound delivery of campaign messages.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::{ApiError, RequestError};
use thiserror::Error;

use crate::database::{CampaignPayload, url_keyboard};

/// Classified transport failure.
#[derive(Debug, Error)]
pub enum SendError {
    /// Telegram asked us to slow down.
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),

    /// Retrying will not help (blocked, deactivated, bad request, ...).
    #[error("{0}")]
    Permanent(String),
}

impl From<RequestError> for SendError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(secs) => Self::RetryAfter(secs.duration()),
            RequestError::Api(ApiError::BotBlocked) => Self::Permanent("bot blocked by user".to_string()),
            RequestError::Api(ApiError::UserDeactivated) => Self::Permanent("user deactivated".to_string()),
            RequestError::Api(ApiError::ChatNotFound) => Self::Permanent("chat not found".to_string()),
            other => Self::Permanent(other.to_string()),
        }
    }
}

#[async_trait]
pub trait BroadcastSender: Send + Sync {
    /// Send one campaign message to a private chat.
    async fn deliver(&self, user_id: u64, payload: &CampaignPayload) -> Result<(), SendError>;

    /// Send a plain HTML notice (admin summaries).
    async fn notify(&self, user_id: u64, text: &str) -> Result<(), SendError>;
}

/// Sender backed by the plain bot.
///
/// The `Throttle` adaptor retries rate-limited requests on its own, which
/// would hide `RetryAfter` from the campaign loop; pacing and the single
/// retry happen in the worker instead.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl BroadcastSender for TelegramSender {
    async fn deliver(&self, user_id: u64, payload: &CampaignPayload) -> Result<(), SendError> {
        let chat_id = ChatId(user_id as i64);
        let keyboard = url_keyboard(&payload.buttons);
        let caption = payload.caption.as_deref().unwrap_or_default();

        match &payload.photo {
            Some(file_id) => {
                let mut req = self.bot.send_photo(chat_id, InputFile::file_id(file_id));
                if !caption.is_empty() {
                    req = req.caption(caption).parse_mode(ParseMode::Html);
                }
                if let Some(kb) = keyboard {
                    req = req.reply_markup(kb);
                }
                req.await?;
            }
            None => {
                let mut req = self.bot.send_message(chat_id, caption).parse_mode(ParseMode::Html);
                if let Some(kb) = keyboard {
                    req = req.reply_markup(kb);
                }
                req.await?;
            }
        }

        Ok(())
    }

    async fn notify(&self, user_id: u64, text: &str) -> Result<(), SendError> {
        self.bot
            .send_message(ChatId(user_id as i64), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router};
    use teloxide::types::Seconds;

    #[test]
    fn retry_after_is_transient() {
        let err = SendError::from(RequestError::RetryAfter(Seconds::from_seconds(2)));
        assert!(matches!(err, SendError::RetryAfter(d) if d == Duration::from_secs(2)));
    }

    #[test]
    fn blocked_user_is_permanent() {
        let err = SendError::from(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, SendError::Permanent(ref msg) if msg.contains("blocked")));
    }

    /// Local Bot API stand-in that always answers 429.
    async fn rate_limited_api() -> (url::Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(serde_json::json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 1",
                    "parameters": { "retry_after": 1 }
                }))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url::Url::parse(&format!("http://{}/", addr)).unwrap(), hits)
    }

    #[tokio::test]
    async fn rate_limit_reaches_the_caller() {
        let (api_url, hits) = rate_limited_api().await;
        let sender = TelegramSender::new(Bot::new("1:token").set_api_url(api_url));
        let payload = CampaignPayload {
            caption: Some("hi".to_string()),
            ..CampaignPayload::default()
        };

        let result = tokio::time::timeout(Duration::from_secs(3), sender.deliver(42, &payload))
            .await
            .expect("delivery must not retry internally");

        assert!(matches!(result, Err(SendError::RetryAfter(d)) if d == Duration::from_secs(1)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
