//! Internationalization (i18n) module.
//!
//! Translations are embedded at compile time and resolved with dotted keys,
//! e.g. `"tasks.name_granted"`. Missing keys fall back to English, then to the
//! key itself.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

use crate::database::Language;

/// Language of admin-facing screens and notices.
pub const ADMIN_LANGUAGE: Language = Language::Ru;

/// Global translation store: LangCode -> Key -> Text
static TRANSLATIONS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

fn store() -> &'static HashMap<&'static str, Value> {
    TRANSLATIONS.get_or_init(|| {
        let mut map = HashMap::new();
        for (code, raw) in [("en", include_str!("en.json")), ("ru", include_str!("ru.json"))] {
            match serde_json::from_str(raw) {
                Ok(val) => {
                    map.insert(code, val);
                }
                Err(e) => warn!("Failed to parse {} translations: {}", code, e),
            }
        }
        map
    })
}

/// Load translations eagerly so a broken file shows up in the startup log.
pub fn init() {
    store();
}

/// Get text for a key in a specific language.
pub fn get_text(lang: Language, key: &str) -> String {
    let store = store();

    if let Some(text) = store.get(lang.code()).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    // Fallback to "en"
    if let Some(text) = store.get("en").and_then(|val| resolve_key(val, key)) {
        return text;
    }

    key.to_string()
}

/// Get text and substitute `{name}` placeholders.
pub fn t(lang: Language, key: &str, args: &[(&str, &str)]) -> String {
    let mut text = get_text(lang, key);
    for (name, value) in args {
        text = text.replace(&format!("{{{}}}", name), value);
    }
    text
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_languages_resolve() {
        assert_eq!(get_text(Language::En, "common.back"), "🔙 Back");
        assert_eq!(get_text(Language::Ru, "common.back"), "🔙 Назад");
    }

    #[test]
    fn unknown_key_returns_key() {
        assert_eq!(get_text(Language::Ru, "nope.missing"), "nope.missing");
    }

    #[test]
    fn placeholders_are_substituted() {
        let text = t(Language::En, "flood.blocked", &[("seconds", "20")]);
        assert!(text.contains("20 seconds"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn every_english_key_exists_in_russian() {
        fn walk(prefix: &str, val: &Value, out: &mut Vec<String>) {
            if let Some(obj) = val.as_object() {
                for (k, v) in obj {
                    let key = if prefix.is_empty() { k.clone() } else { format!("{}.{}", prefix, k) };
                    walk(&key, v, out);
                }
            } else {
                out.push(prefix.to_string());
            }
        }

        let mut keys = Vec::new();
        walk("", &store()["en"], &mut keys);
        for key in keys {
            assert!(resolve_key(&store()["ru"], &key).is_some(), "missing ru key {}", key);
        }
    }
}
