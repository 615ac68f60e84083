//! Internationalization (i18n) module.
//!
//! User-facing notices live in embedded JSON tables, one per language.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

/// Global translation store: LangCode -> Key -> Text
static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

const DEFAULT_LOCALE: &str = "en";

/// Load the embedded translation tables. Safe to call more than once.
pub fn init() {
    TRANSLATIONS.get_or_init(|| {
        let mut map = HashMap::new();
        for (lang, raw) in [("en", include_str!("en.json")), ("fr", include_str!("fr.json"))] {
            match serde_json::from_str(raw) {
                Ok(val) => {
                    map.insert(lang.to_string(), val);
                }
                Err(e) => tracing::error!("Broken translation table {}: {}", lang, e),
            }
        }
        map
    });
}

/// Get text for a key in a specific language.
/// Supports nested keys via dot notation, e.g., "antibot.usage".
pub fn get_text(lang: &str, key: &str) -> String {
    let Some(store) = TRANSLATIONS.get() else {
        return key.to_string();
    };

    if let Some(text) = store.get(lang).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    if lang != DEFAULT_LOCALE
        && let Some(text) = store.get(DEFAULT_LOCALE).and_then(|val| resolve_key(val, key))
    {
        return text;
    }

    key.to_string()
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_fallback() {
        init();
        assert_eq!(get_text("en", "common.unknown_command"), "Unknown command.");
        assert_eq!(get_text("fr", "common.unknown_command"), "Commande inconnue.");
        // Unknown language falls back to English.
        assert_eq!(get_text("de", "kick.usage"), "Tag the member to remove.");
        assert_eq!(get_text("en", "missing.key"), "missing.key");
    }

    #[test]
    fn test_tables_share_keys() {
        init();
        for key in [
            "common.group_only",
            "autopromote.direct_only",
            "autopromote.enabled",
            "autopromote.disabled",
            "autopromote.usage",
            "ghost.start",
            "ghost.done",
            "kick.usage",
            "antibot.usage",
            "antibot.warning",
        ] {
            assert_ne!(get_text("en", key), key);
            assert_ne!(get_text("fr", key), key);
        }
    }
}
