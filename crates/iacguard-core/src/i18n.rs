//! Internationalized text.
//!
//! Rule and pack metadata fields such as `name` or `reason` may be written
//! either as a plain string or as a mapping from language code to text.
//! [`I18nString`] models both shapes and resolves them for a target language.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Language used when the requested language has no translation.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Secondary fallback language tried after [`DEFAULT_LANGUAGE`].
const SECONDARY_LANGUAGE: &str = "zh";

/// Text that is either plain or keyed by language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum I18nString {
    /// A single untranslated string.
    Plain(String),
    /// Language code to text.
    Localized(BTreeMap<String, String>),
}

impl Default for I18nString {
    fn default() -> Self {
        Self::Localized(BTreeMap::new())
    }
}

impl From<&str> for I18nString {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<String> for I18nString {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

impl I18nString {
    /// Decodes a metadata value.
    ///
    /// Strings become [`I18nString::Plain`], objects become
    /// [`I18nString::Localized`] (non-string entries are ignored). Any other
    /// shape degrades to an empty value.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Plain(s.clone()),
            Value::Object(map) => Self::Localized(
                map.iter()
                    .filter_map(|(lang, text)| text.as_str().map(|t| (lang.clone(), t.to_string())))
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Builds a localized value from `(language, text)` pairs.
    #[must_use]
    pub fn localized<I, L, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<String>,
    {
        Self::Localized(
            entries
                .into_iter()
                .map(|(lang, text)| (lang.into(), text.into()))
                .collect(),
        )
    }

    /// Returns `true` when no text would ever be resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Plain(s) => s.is_empty(),
            Self::Localized(map) => map.values().all(String::is_empty),
        }
    }

    /// Resolves the text for `lang`.
    ///
    /// Falls back to [`DEFAULT_LANGUAGE`], then Chinese, then the first
    /// available translation. Returns an empty string when there is none.
    #[must_use]
    pub fn resolve(&self, lang: &str) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Localized(map) => map
                .get(lang)
                .or_else(|| map.get(DEFAULT_LANGUAGE))
                .or_else(|| map.get(SECONDARY_LANGUAGE))
                .or_else(|| map.values().next())
                .map_or("", String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_resolves_for_any_language() {
        let text = I18nString::from("Disk must be encrypted");
        assert_eq!(text.resolve("en"), "Disk must be encrypted");
        assert_eq!(text.resolve("zh"), "Disk must be encrypted");
    }

    #[test]
    fn test_localized_fallback_order() {
        let text = I18nString::localized([("en", "English"), ("zh", "Chinese")]);
        assert_eq!(text.resolve("zh"), "Chinese");
        assert_eq!(text.resolve("fr"), "English");

        let only_zh = I18nString::localized([("zh", "Chinese"), ("ja", "Japanese")]);
        assert_eq!(only_zh.resolve("fr"), "Chinese");

        let only_ja = I18nString::localized([("ja", "Japanese")]);
        assert_eq!(only_ja.resolve("en"), "Japanese");
    }

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(
            I18nString::from_json(&json!("plain")),
            I18nString::Plain("plain".to_string())
        );
        assert_eq!(
            I18nString::from_json(&json!({"en": "a", "zh": "b", "bad": 1})),
            I18nString::localized([("en", "a"), ("zh", "b")])
        );
        assert!(I18nString::from_json(&json!(42)).is_empty());
        assert!(I18nString::from_json(&json!(["a"])).is_empty());
    }

    #[test]
    fn test_empty_resolves_to_empty_string() {
        assert_eq!(I18nString::default().resolve("en"), "");
    }

    #[test]
    fn test_serde_untagged_round_shape() {
        let plain: I18nString = serde_json::from_value(json!("x")).unwrap();
        assert!(matches!(plain, I18nString::Plain(_)));

        let localized: I18nString = serde_json::from_value(json!({"en": "x"})).unwrap();
        assert!(matches!(localized, I18nString::Localized(_)));
    }
}
