//! Inbound update classification.

use teloxide::types::{CallbackQuery, Message};

use crate::utils::entities_to_html;

/// What an admin sent while a draft is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Plain text, rendered to HTML so formatting survives the broadcast.
    Text(String),
    /// Largest size of a photo and its (HTML) caption.
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    /// Callback data.
    Callback(String),
}

impl Incoming {
    /// `None` for messages the composer cannot use (stickers, documents...).
    pub fn from_message(msg: &Message) -> Option<Self> {
        if let Some(sizes) = msg.photo() {
            let largest = sizes.iter().max_by_key(|p| p.width * p.height)?;
            return Some(Self::Photo {
                file_id: largest.file.id.clone(),
                caption: msg
                    .caption()
                    .map(|c| entities_to_html(c, msg.caption_entities().unwrap_or_default())),
            });
        }

        msg.text()
            .map(|text| Self::Text(entities_to_html(text, msg.entities().unwrap_or_default())))
    }

    pub fn from_callback(q: &CallbackQuery) -> Option<Self> {
        q.data.clone().map(Self::Callback)
    }
}
