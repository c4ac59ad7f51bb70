//! Rendering of Telegram message entities back to HTML.
//!
//! Admin input arrives as plain text plus entities; campaigns are stored and
//! sent in HTML parse mode, so formatting is rebuilt here.

use teloxide::types::{MessageEntity, MessageEntityKind, MessageEntityRef};

use super::html_escape;

fn attr_escape(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

/// Opening and closing tag for an entity, `None` for kinds Telegram detects
/// on its own (mentions, hashtags, plain URLs...).
fn tags(kind: &MessageEntityKind) -> Option<(String, String)> {
    let simple = |tag: &str| Some((format!("<{tag}>"), format!("</{tag}>")));

    match kind {
        MessageEntityKind::Bold => simple("b"),
        MessageEntityKind::Italic => simple("i"),
        MessageEntityKind::Underline => simple("u"),
        MessageEntityKind::Strikethrough => simple("s"),
        MessageEntityKind::Spoiler => simple("tg-spoiler"),
        MessageEntityKind::Code => simple("code"),
        MessageEntityKind::Blockquote => simple("blockquote"),
        MessageEntityKind::Pre { language: None } => simple("pre"),
        MessageEntityKind::Pre { language: Some(lang) } => Some((
            format!("<pre><code class=\"language-{}\">", attr_escape(lang)),
            "</code></pre>".to_string(),
        )),
        MessageEntityKind::TextLink { url } => {
            Some((format!("<a href=\"{}\">", attr_escape(url.as_str())), "</a>".to_string()))
        }
        MessageEntityKind::TextMention { user } => {
            Some((format!("<a href=\"tg://user?id={}\">", user.id.0), "</a>".to_string()))
        }
        MessageEntityKind::CustomEmoji { custom_emoji_id } => Some((
            format!("<tg-emoji emoji-id=\"{}\">", attr_escape(custom_emoji_id)),
            "</tg-emoji>".to_string(),
        )),
        _ => None,
    }
}

struct Tag {
    at: usize,
    other_end: usize,
    index: usize,
    text: String,
}

/// Rebuild HTML from text and its (UTF-16 offset) entities.
pub fn entities_to_html(text: &str, entities: &[MessageEntity]) -> String {
    let mut opens = Vec::new();
    let mut closes = Vec::new();

    for (index, entity) in MessageEntityRef::parse(text, entities).iter().enumerate() {
        if entity.start() >= entity.end() {
            continue;
        }
        let Some((open, close)) = tags(entity.kind()) else {
            continue;
        };
        opens.push(Tag { at: entity.start(), other_end: entity.end(), index, text: open });
        closes.push(Tag { at: entity.end(), other_end: entity.start(), index, text: close });
    }

    // Outer entities open first and close last.
    opens.sort_by(|a, b| a.at.cmp(&b.at).then(b.other_end.cmp(&a.other_end)).then(a.index.cmp(&b.index)));
    closes.sort_by(|a, b| a.at.cmp(&b.at).then(b.other_end.cmp(&a.other_end)).then(b.index.cmp(&a.index)));

    let mut opens = opens.into_iter().peekable();
    let mut closes = closes.into_iter().peekable();
    let mut out = String::with_capacity(text.len() * 2);

    let chars = text.char_indices().map(|(i, c)| (i, Some(c)));
    for (pos, ch) in chars.chain(std::iter::once((text.len(), None))) {
        while let Some(tag) = closes.next_if(|t| t.at <= pos) {
            out.push_str(&tag.text);
        }
        while let Some(tag) = opens.next_if(|t| t.at <= pos) {
            out.push_str(&tag.text);
        }
        match ch {
            Some('&') => out.push_str("&amp;"),
            Some('<') => out.push_str("&lt;"),
            Some('>') => out.push_str("&gt;"),
            Some(c) => out.push(c),
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(entities_to_html("a < b & c", &[]), "a &lt; b &amp; c");
    }

    #[test]
    fn nested_entities() {
        // "Hello world": bold over everything, italic over "world"
        let entities = vec![MessageEntity::bold(0, 11), MessageEntity::italic(6, 5)];
        assert_eq!(entities_to_html("Hello world", &entities), "<b>Hello <i>world</i></b>");
    }

    #[test]
    fn same_range_closes_in_reverse() {
        let entities = vec![MessageEntity::bold(0, 2), MessageEntity::underline(0, 2)];
        assert_eq!(entities_to_html("hi", &entities), "<b><u>hi</u></b>");
    }

    #[test]
    fn utf16_offsets_and_links() {
        // The emoji takes two UTF-16 units.
        let url = url::Url::parse("https://example.com/?a=1&b=2").unwrap();
        let entities = vec![MessageEntity::text_link(url, 3, 4)];
        assert_eq!(
            entities_to_html("😀 link", &entities),
            "😀 <a href=\"https://example.com/?a=1&amp;b=2\">link</a>"
        );
    }

    #[test]
    fn detected_entities_are_left_plain() {
        let entities = vec![MessageEntity::new(MessageEntityKind::Hashtag, 0, 4)];
        assert_eq!(entities_to_html("#tag", &entities), "#tag");
    }
}
