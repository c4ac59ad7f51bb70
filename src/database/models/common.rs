//! Common shared models.

use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

/// URL button attached to a broadcast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Button text
    pub text: String,
    /// URL to open when clicked
    pub url: String,
}

impl InlineButton {
    /// Create a new inline button.
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Build an inline keyboard from button rows.
///
/// Buttons whose URL does not parse are skipped; `None` when nothing is left.
pub fn url_keyboard(rows: &[Vec<InlineButton>]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|b| {
                    Url::parse(&b.url)
                        .ok()
                        .map(|url| InlineKeyboardButton::url(b.text.clone(), url))
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_urls_are_skipped() {
        let rows = vec![
            vec![InlineButton::new("ok", "https://example.com")],
            vec![InlineButton::new("bad", "not a url")],
        ];
        let markup = url_keyboard(&rows).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert!(url_keyboard(&[vec![InlineButton::new("bad", "nope")]]).is_none());
        assert!(url_keyboard(&[]).is_none());
    }
}
