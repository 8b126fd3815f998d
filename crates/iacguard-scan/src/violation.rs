//! Violation records.
//!
//! [`OpaViolation`] is what a rule's `deny` set yields. [`RichViolation`]
//! adds the source location and text resolved for one language, keeping
//! the raw values so it can be localized again later.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use iacguard_core::{I18nString, Severity};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One step of a violation path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Mapping key.
    Key(String),
    /// Sequence index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

/// Metadata a rule attaches to each violation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationMeta {
    /// Severity as written by the rule.
    #[serde(default)]
    pub severity: String,
    /// Why it matters.
    #[serde(default, deserialize_with = "lenient_i18n")]
    pub reason: Option<I18nString>,
    /// How to fix it.
    #[serde(default, deserialize_with = "lenient_i18n")]
    pub recommendation: Option<I18nString>,
}

/// Accepts a string or language map; other shapes become empty text.
fn lenient_i18n<'de, D>(deserializer: D) -> Result<Option<I18nString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_null())
        .map(|v| I18nString::from_json(&v)))
}

/// A violation as produced by a rule's `deny` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaViolation {
    /// Rule ID, short or full.
    pub id: String,
    /// Logical ID of the offending resource; empty for document-level checks.
    #[serde(default)]
    pub resource_id: String,
    /// Path below the resource (or the document root).
    #[serde(default)]
    pub violation_path: Vec<PathSegment>,
    /// Rule metadata.
    #[serde(default)]
    pub meta: ViolationMeta,
}

/// Rewrites short violation IDs to full IDs.
///
/// Unmapped IDs are left alone, so expanding twice equals expanding once.
pub fn expand_ids(violations: &mut [OpaViolation], mapping: &HashMap<String, String>) {
    if mapping.is_empty() {
        return;
    }
    for violation in violations {
        if let Some(full) = mapping.get(&violation.id) {
            violation.id.clone_from(full);
        }
    }
}

/// One line of a snippet window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetLine {
    /// 1-based line number.
    pub number: usize,
    /// Line text.
    pub content: String,
    /// Whether this is the violation's line.
    pub highlight: bool,
}

/// A violation enriched with its source location and resolved text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichViolation {
    /// Full rule ID.
    pub id: String,
    /// Logical ID of the offending resource.
    pub resource_id: String,
    /// Path below the resource.
    pub violation_path: Vec<PathSegment>,
    /// Normalized severity.
    pub severity: Severity,
    /// Template file.
    pub file: PathBuf,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    /// Trimmed text of the violation's line.
    pub snippet: String,
    /// Context window around the line.
    pub snippet_lines: Vec<SnippetLine>,
    /// Reason resolved for the current language.
    pub reason: String,
    /// Recommendation resolved for the current language.
    pub recommendation: String,
    /// Reason before localization.
    pub raw_reason: I18nString,
    /// Recommendation before localization.
    pub raw_recommendation: I18nString,
}

impl RichViolation {
    /// Re-resolves `reason` and `recommendation` for `lang`.
    pub fn localize(&mut self, lang: &str) {
        self.reason = self.raw_reason.resolve(lang).to_string();
        self.recommendation = self.raw_recommendation.resolve(lang).to_string();
    }

    /// Renders the violation path as `a.b[0].c`.
    #[must_use]
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.violation_path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(idx) => {
                    out.push('[');
                    out.push_str(&idx.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}
