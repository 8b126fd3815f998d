//! Rule and pack catalog records.
//!
//! A [`Rule`] is a single compliance check; a [`Pack`] is a named bundle of
//! rule IDs. Both are extracted from Rego sources and are immutable once
//! built. A record from a higher-priority tier supersedes, never mutates, a
//! record with the same ID.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::i18n::I18nString;

/// Root of every policy namespace (`iacguard.rules.*`, `iacguard.packs.*`).
pub const NAMESPACE_ROOT: &str = "iacguard";

/// Severity of a rule.
///
/// Ordering places [`Severity::High`] first so that an ascending sort lists
/// the most severe rules at the top.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// High severity.
    High,
    /// Medium severity.
    #[default]
    Medium,
    /// Low severity.
    Low,
}

impl Severity {
    /// Parses leniently: case-insensitive, unknown input becomes
    /// [`Severity::Medium`].
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(Error::InvalidSeverity {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of policy file, derived from its Rego namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// `iacguard.rules.*`
    Rule,
    /// `iacguard.packs.*`
    Pack,
}

impl PolicyKind {
    /// Classifies a namespace such as `iacguard.rules.aliyun.ecs_public_ip`.
    ///
    /// Returns `None` for helper libraries and anything outside the
    /// recognized prefixes.
    #[must_use]
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        let rest = namespace.strip_prefix(NAMESPACE_ROOT)?.strip_prefix('.')?;
        if rest.strip_prefix("rules.").is_some_and(|tail| !tail.is_empty()) {
            Some(Self::Rule)
        } else if rest.strip_prefix("packs.").is_some_and(|tail| !tail.is_empty()) {
            Some(Self::Pack)
        } else {
            None
        }
    }

    /// Name of the metadata constant (`rule_meta` / `pack_meta`).
    #[must_use]
    pub const fn meta_constant(self) -> &'static str {
        match self {
            Self::Rule => "rule_meta",
            Self::Pack => "pack_meta",
        }
    }

    /// ID prefix (`rule` / `pack`).
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Pack => "pack",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_prefix())
    }
}

/// A single compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Globally unique ID, `rule:<provider>:<slug>`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: I18nString,
    /// Longer description.
    #[serde(default)]
    pub description: I18nString,
    /// Why a violation matters.
    #[serde(default)]
    pub reason: I18nString,
    /// How to fix a violation.
    #[serde(default)]
    pub recommendation: I18nString,
    /// Normalized severity.
    #[serde(default)]
    pub severity: Severity,
    /// Resource types the rule inspects, in declaration order.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Source location.
    #[serde(default)]
    pub file_path: PathBuf,
    /// Rego package the rule lives in.
    #[serde(default)]
    pub package_name: String,
    /// Raw Rego source; empty when only the path is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Rule {
    /// Creates a rule with the given ID and default metadata.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: I18nString::default(),
            description: I18nString::default(),
            reason: I18nString::default(),
            recommendation: I18nString::default(),
            severity: Severity::default(),
            resource_types: Vec::new(),
            file_path: PathBuf::new(),
            package_name: String::new(),
            content: String::new(),
        }
    }

    /// Returns the last colon-separated segment of the ID.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.rsplit(':').next().unwrap_or(&self.id)
    }
}

/// A named bundle of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    /// Globally unique ID, `pack:<provider>:<slug>`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: I18nString,
    /// Longer description.
    #[serde(default)]
    pub description: I18nString,
    /// Full rule IDs, in declaration order.
    #[serde(default)]
    pub rule_ids: Vec<String>,
    /// Source location.
    #[serde(default)]
    pub file_path: PathBuf,
    /// Rego package the pack lives in.
    #[serde(default)]
    pub package_name: String,
    /// Raw Rego source; empty when only the path is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Pack {
    /// Creates a pack with the given ID and no rules.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: I18nString::default(),
            description: I18nString::default(),
            rule_ids: Vec::new(),
            file_path: PathBuf::new(),
            package_name: String::new(),
            content: String::new(),
        }
    }
}

/// Sorts rules for display: most severe first, then by ID.
pub fn sort_rules(rules: &mut [Rule]) {
    rules.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.id.cmp(&b.id)));
}
