//! Rule and pack metadata extraction.
//!
//! Metadata lives in the policy itself as a Rego constant (`rule_meta` or
//! `pack_meta`). Because authors may compute fields with helper functions,
//! the constant is read by evaluating it, not by parsing text.
//!
//! A file without a package, outside the recognized namespaces, or without
//! the constant yields `Ok(None)`: it is simply not a policy.

use std::collections::BTreeMap;
use std::path::Path;

use iacguard_core::ids::{
    generate_id_prefix, generate_pack_id, generate_rule_id, join_id, slug_from_path, to_kebab,
};
use iacguard_core::{I18nString, IdKind, Pack, PolicyKind, Rule, Severity};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::engine::{EvalResult, RegoEngine};
use crate::error::Result;
use crate::parser::Parser;

/// A decoded catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRecord {
    /// From a `iacguard.rules.*` module.
    Rule(Rule),
    /// From a `iacguard.packs.*` module.
    Pack(Pack),
}

impl PolicyRecord {
    /// The record's full ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Rule(rule) => &rule.id,
            Self::Pack(pack) => &pack.id,
        }
    }
}

/// Extracts catalog records from Rego sources.
///
/// # Examples
///
/// ```rust,ignore
/// use iacguard_compiler::MetadataExtractor;
///
/// let extractor = MetadataExtractor::new().with_helper_modules(lib_modules);
/// if let Some(record) = extractor.extract(&source, path, base_dir)? {
///     println!("found {}", record.id());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    helper_modules: BTreeMap<String, String>,
}

impl MetadataExtractor {
    /// Creates an extractor without helper modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the helper modules supplied as context to every evaluation.
    #[must_use]
    pub fn with_helper_modules(mut self, modules: BTreeMap<String, String>) -> Self {
        self.helper_modules = modules;
        self
    }

    /// Adds helper modules, keeping existing names.
    pub fn extend_helper_modules(&mut self, modules: &BTreeMap<String, String>) {
        for (name, source) in modules {
            self.helper_modules
                .entry(name.clone())
                .or_insert_with(|| source.clone());
        }
    }

    /// Returns the helper modules.
    #[must_use]
    pub const fn helper_modules(&self) -> &BTreeMap<String, String> {
        &self.helper_modules
    }

    /// Extracts a rule or pack from `source`.
    ///
    /// `base_dir` is the directory the file was discovered in; it drives ID
    /// generation when the author did not supply a usable ID.
    ///
    /// # Errors
    ///
    /// Returns an error only when the evaluator fails (parse or compile
    /// errors). A missing namespace or metadata constant is `Ok(None)`.
    #[instrument(skip(self, source), fields(file = %file_path.display()))]
    pub fn extract(
        &self,
        source: &str,
        file_path: &Path,
        base_dir: &Path,
    ) -> Result<Option<PolicyRecord>> {
        let Some(namespace) = Parser::package_name(source) else {
            debug!("No package declaration, not a policy");
            return Ok(None);
        };
        let Some(kind) = PolicyKind::from_namespace(&namespace) else {
            debug!(namespace, "Namespace is not a rule or pack");
            return Ok(None);
        };

        let Some(meta) = self.read_meta(source, file_path, &namespace, kind)? else {
            debug!(namespace, "No metadata constant");
            return Ok(None);
        };

        let record = match kind {
            PolicyKind::Rule => PolicyRecord::Rule(decode_rule(
                &meta, source, file_path, base_dir, &namespace,
            )),
            PolicyKind::Pack => PolicyRecord::Pack(decode_pack(
                &meta, source, file_path, base_dir, &namespace,
            )),
        };
        Ok(Some(record))
    }

    /// Extracts only rules; packs and non-policies yield `None`.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract).
    pub fn extract_rule(&self, source: &str, file_path: &Path, base_dir: &Path) -> Result<Option<Rule>> {
        Ok(match self.extract(source, file_path, base_dir)? {
            Some(PolicyRecord::Rule(rule)) => Some(rule),
            _ => None,
        })
    }

    /// Extracts only packs; rules and non-policies yield `None`.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract).
    pub fn extract_pack(&self, source: &str, file_path: &Path, base_dir: &Path) -> Result<Option<Pack>> {
        Ok(match self.extract(source, file_path, base_dir)? {
            Some(PolicyRecord::Pack(pack)) => Some(pack),
            _ => None,
        })
    }

    fn read_meta(
        &self,
        source: &str,
        file_path: &Path,
        namespace: &str,
        kind: PolicyKind,
    ) -> Result<Option<Map<String, Value>>> {
        let mut engine = RegoEngine::new();
        engine.add_policies(&self.helper_modules)?;
        engine.add_policy(&file_path.to_string_lossy(), source)?;

        let query = format!("data.{namespace}.{}", kind.meta_constant());
        match engine.eval(&query)? {
            EvalResult::Object(meta) => Ok(Some(meta)),
            EvalResult::Undefined => Ok(None),
            other => {
                debug!(query, ?other, "Metadata constant is not an object");
                Ok(None)
            }
        }
    }
}

fn string_field<'a>(meta: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn i18n_field(meta: &Map<String, Value>, key: &str) -> I18nString {
    meta.get(key).map(I18nString::from_json).unwrap_or_default()
}

fn string_list(meta: &Map<String, Value>, key: &str) -> Vec<String> {
    meta.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves the record ID: keep a fully-prefixed author ID, otherwise
/// generate one from the author slug or the file name.
fn resolve_id(
    meta: &Map<String, Value>,
    file_path: &Path,
    base_dir: &Path,
    kind: PolicyKind,
) -> String {
    let generate = match kind {
        PolicyKind::Rule => generate_rule_id,
        PolicyKind::Pack => generate_pack_id,
    };
    let required_prefix = format!("{}:", kind.id_prefix());

    match string_field(meta, "id") {
        Some(id) if id.starts_with(&required_prefix) => id.to_string(),
        Some(slug) => generate(file_path, base_dir, slug),
        None => generate(file_path, base_dir, &slug_from_path(file_path)),
    }
}

fn decode_rule(
    meta: &Map<String, Value>,
    source: &str,
    file_path: &Path,
    base_dir: &Path,
    namespace: &str,
) -> Rule {
    Rule {
        id: resolve_id(meta, file_path, base_dir, PolicyKind::Rule),
        name: i18n_field(meta, "name"),
        description: i18n_field(meta, "description"),
        reason: i18n_field(meta, "reason"),
        recommendation: i18n_field(meta, "recommendation"),
        severity: meta
            .get("severity")
            .and_then(Value::as_str)
            .map(Severity::normalize)
            .unwrap_or_default(),
        resource_types: string_list(meta, "resource_types"),
        file_path: file_path.to_path_buf(),
        package_name: namespace.to_string(),
        content: source.to_string(),
    }
}

fn decode_pack(
    meta: &Map<String, Value>,
    source: &str,
    file_path: &Path,
    base_dir: &Path,
    namespace: &str,
) -> Pack {
    let rule_prefix =
        generate_id_prefix(file_path, base_dir, IdKind::Pack).replacen("pack:", "rule:", 1);

    let rule_ids = string_list(meta, "rules")
        .into_iter()
        .map(|rule_id| {
            if rule_id.starts_with("rule:") {
                rule_id
            } else {
                join_id(&rule_prefix, &to_kebab(&rule_id))
            }
        })
        .collect();

    Pack {
        id: resolve_id(meta, file_path, base_dir, PolicyKind::Pack),
        name: i18n_field(meta, "name"),
        description: i18n_field(meta, "description"),
        rule_ids,
        file_path: file_path.to_path_buf(),
        package_name: namespace.to_string(),
        content: source.to_string(),
    }
}
