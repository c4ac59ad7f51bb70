//! Per-admin campaign draft state machine.
//!
//! Drafts live in memory only; a restart drops unfinished drafts.

use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::bot::Incoming;
use crate::database::{Audience, CampaignPayload, InlineButton};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerStep {
    AwaitingLanguage,
    AwaitingContent,
    AwaitingButtons,
    AwaitingButtonText,
    AwaitingButtonUrl,
    AwaitingConfirmation,
}

#[derive(Debug, Clone)]
pub struct Draft {
    pub step: ComposerStep,
    pub audience: Audience,
    pub payload: CampaignPayload,
    pending_text: Option<String>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            step: ComposerStep::AwaitingLanguage,
            audience: Audience::All,
            payload: CampaignPayload::default(),
            pending_text: None,
        }
    }
}

/// What the handler should show after an input.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerReply {
    AskLanguage,
    AskContent,
    ContentMissing,
    AskButtons,
    AskButtonText,
    AskButtonUrl,
    InvalidUrl,
    ButtonAdded,
    Preview(CampaignPayload),
    /// Draft finished; the campaign must be persisted and enqueued.
    Confirmed(Audience, CampaignPayload),
    Cancelled,
    /// Input does not fit the current step.
    Ignored,
}

impl Draft {
    /// Advance the draft with one input.
    pub fn apply(&mut self, input: Incoming) -> ComposerReply {
        use ComposerStep::*;

        if matches!(&input, Incoming::Callback(data) if data == "spam_cancel") {
            return ComposerReply::Cancelled;
        }

        match (self.step, input) {
            (AwaitingLanguage, Incoming::Callback(data)) => {
                let Some(audience) = data.strip_prefix("spam_language_").and_then(Audience::from_code) else {
                    return ComposerReply::Ignored;
                };
                self.audience = audience;
                self.step = AwaitingContent;
                ComposerReply::AskContent
            }

            (AwaitingContent, Incoming::Callback(data)) if data == "spam_back_language" => {
                self.step = AwaitingLanguage;
                ComposerReply::AskLanguage
            }
            (AwaitingContent, Incoming::Text(text)) => {
                if text.trim().is_empty() {
                    return ComposerReply::ContentMissing;
                }
                self.payload.caption = Some(text);
                self.payload.photo = None;
                self.step = AwaitingButtons;
                ComposerReply::AskButtons
            }
            (AwaitingContent, Incoming::Photo { file_id, caption }) => {
                self.payload.photo = Some(file_id);
                self.payload.caption = caption.filter(|c| !c.trim().is_empty());
                self.step = AwaitingButtons;
                ComposerReply::AskButtons
            }
            (AwaitingContent, _) => ComposerReply::ContentMissing,

            (AwaitingButtons, Incoming::Callback(data)) => match data.as_str() {
                "spam_add_button" => {
                    self.step = AwaitingButtonText;
                    ComposerReply::AskButtonText
                }
                "spam_skip_buttons" | "spam_finish_buttons" => {
                    self.step = AwaitingConfirmation;
                    ComposerReply::Preview(self.payload.clone())
                }
                "spam_back_content" => self.back_to_content(),
                _ => ComposerReply::Ignored,
            },

            (AwaitingButtonText, Incoming::Text(text)) if !text.trim().is_empty() => {
                self.pending_text = Some(text.trim().to_string());
                self.step = AwaitingButtonUrl;
                ComposerReply::AskButtonUrl
            }
            (AwaitingButtonText, _) => ComposerReply::AskButtonText,

            (AwaitingButtonUrl, Incoming::Text(raw)) => {
                let raw = raw.trim();
                let valid = Url::parse(raw)
                    .map(|url| matches!(url.scheme(), "http" | "https" | "tg"))
                    .unwrap_or(false);
                if !valid {
                    return ComposerReply::InvalidUrl;
                }
                let text = self.pending_text.take().unwrap_or_default();
                self.payload.buttons.push(vec![InlineButton::new(text, raw)]);
                self.step = AwaitingButtons;
                ComposerReply::ButtonAdded
            }
            (AwaitingButtonUrl, _) => ComposerReply::InvalidUrl,

            (AwaitingConfirmation, Incoming::Callback(data)) => match data.as_str() {
                "spam_confirm" if self.payload.is_empty() => self.back_to_content(),
                "spam_confirm" => ComposerReply::Confirmed(self.audience, self.payload.clone()),
                "spam_back_buttons" => {
                    self.step = AwaitingButtons;
                    ComposerReply::AskButtons
                }
                "spam_back_content" => self.back_to_content(),
                _ => ComposerReply::Ignored,
            },

            _ => ComposerReply::Ignored,
        }
    }

    fn back_to_content(&mut self) -> ComposerReply {
        self.payload = CampaignPayload::default();
        self.pending_text = None;
        self.step = ComposerStep::AwaitingContent;
        ComposerReply::AskContent
    }
}

/// Open drafts keyed by admin id.
#[derive(Clone, Default)]
pub struct Composer {
    drafts: Arc<DashMap<u64, Draft>>,
}

impl Composer {
    /// Start a fresh draft, replacing any open one.
    pub fn open(&self, admin_id: u64) {
        self.drafts.insert(admin_id, Draft::default());
    }

    /// Drop the draft. Returns `false` if there was none.
    pub fn cancel(&self, admin_id: u64) -> bool {
        self.drafts.remove(&admin_id).is_some()
    }

    pub fn is_open(&self, admin_id: u64) -> bool {
        self.drafts.contains_key(&admin_id)
    }

    /// Feed one input to the admin's draft. Finished or cancelled drafts are
    /// removed; `Ignored` when no draft is open.
    pub fn handle(&self, admin_id: u64, input: Incoming) -> ComposerReply {
        let reply = match self.drafts.get_mut(&admin_id) {
            Some(mut draft) => draft.apply(input),
            None => return ComposerReply::Ignored,
        };

        if matches!(reply, ComposerReply::Confirmed(..) | ComposerReply::Cancelled) {
            self.drafts.remove(&admin_id);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Language;

    fn cb(data: &str) -> Incoming {
        Incoming::Callback(data.to_string())
    }

    fn text(t: &str) -> Incoming {
        Incoming::Text(t.to_string())
    }

    #[test]
    fn full_flow_with_one_button() {
        let composer = Composer::default();
        composer.open(7);

        assert_eq!(composer.handle(7, cb("spam_language_en")), ComposerReply::AskContent);
        assert_eq!(composer.handle(7, text("Hello <b>all</b>")), ComposerReply::AskButtons);
        assert_eq!(composer.handle(7, cb("spam_add_button")), ComposerReply::AskButtonText);
        assert_eq!(composer.handle(7, text("Open")), ComposerReply::AskButtonUrl);
        assert_eq!(composer.handle(7, text("not a link")), ComposerReply::InvalidUrl);
        assert_eq!(composer.handle(7, text("https://example.com")), ComposerReply::ButtonAdded);
        assert!(matches!(composer.handle(7, cb("spam_finish_buttons")), ComposerReply::Preview(_)));

        let ComposerReply::Confirmed(audience, payload) = composer.handle(7, cb("spam_confirm")) else {
            panic!("draft was not confirmed");
        };
        assert_eq!(audience, Audience::Language(Language::En));
        assert_eq!(payload.caption.as_deref(), Some("Hello <b>all</b>"));
        assert_eq!(payload.buttons, vec![vec![InlineButton::new("Open", "https://example.com")]]);
        assert!(!composer.is_open(7));
    }

    #[test]
    fn photo_without_caption_is_content() {
        let mut draft = Draft::default();
        draft.apply(cb("spam_language_all"));
        let reply = draft.apply(Incoming::Photo {
            file_id: "photo-1".to_string(),
            caption: None,
        });

        assert_eq!(reply, ComposerReply::AskButtons);
        assert_eq!(draft.audience, Audience::All);
        assert_eq!(draft.payload.photo.as_deref(), Some("photo-1"));
    }

    #[test]
    fn wrong_input_keeps_step() {
        let mut draft = Draft::default();
        assert_eq!(draft.apply(text("hi")), ComposerReply::Ignored);
        assert_eq!(draft.step, ComposerStep::AwaitingLanguage);

        draft.apply(cb("spam_language_ru"));
        assert_eq!(draft.apply(cb("spam_confirm")), ComposerReply::ContentMissing);
        assert_eq!(draft.apply(text("   ")), ComposerReply::ContentMissing);
        assert_eq!(draft.step, ComposerStep::AwaitingContent);
    }

    #[test]
    fn back_navigation() {
        let mut draft = Draft::default();
        draft.apply(cb("spam_language_ru"));
        assert_eq!(draft.apply(cb("spam_back_language")), ComposerReply::AskLanguage);
        assert_eq!(draft.step, ComposerStep::AwaitingLanguage);

        draft.apply(cb("spam_language_ru"));
        draft.apply(text("first"));
        assert_eq!(draft.apply(cb("spam_back_content")), ComposerReply::AskContent);
        assert!(draft.payload.is_empty());
    }

    #[test]
    fn back_to_buttons_keeps_content() {
        let mut draft = Draft::default();
        draft.apply(cb("spam_language_en"));
        draft.apply(text("news"));
        draft.apply(cb("spam_add_button"));
        draft.apply(text("Site"));
        draft.apply(text("https://example.com"));
        assert!(matches!(draft.apply(cb("spam_finish_buttons")), ComposerReply::Preview(_)));

        assert_eq!(draft.apply(cb("spam_back_buttons")), ComposerReply::AskButtons);
        assert_eq!(draft.step, ComposerStep::AwaitingButtons);
        assert_eq!(draft.payload.caption.as_deref(), Some("news"));
        assert_eq!(draft.payload.buttons.len(), 1);

        draft.apply(cb("spam_add_button"));
        draft.apply(text("Chat"));
        draft.apply(text("tg://resolve?domain=chat"));
        let ComposerReply::Preview(payload) = draft.apply(cb("spam_finish_buttons")) else {
            panic!("no preview after adding a second button");
        };
        assert_eq!(payload.buttons.len(), 2);
    }

    #[test]
    fn cancel_from_any_step() {
        let composer = Composer::default();
        composer.open(1);
        composer.handle(1, cb("spam_language_ru"));
        assert_eq!(composer.handle(1, cb("spam_cancel")), ComposerReply::Cancelled);
        assert!(!composer.is_open(1));
        assert_eq!(composer.handle(1, text("late")), ComposerReply::Ignored);
        assert!(!composer.cancel(1));
    }
}
