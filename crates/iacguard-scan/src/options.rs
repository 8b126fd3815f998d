//! Evaluation options.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use iacguard_core::PolicyIndex;

use crate::selection::{build_id_mapping, Selection};

/// Prefix under which helper modules are registered with the evaluator.
pub const LIB_MODULE_PREFIX: &str = "__lib__/";

/// What to evaluate and how to filter the results.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// `.rego` files or directories to load.
    pub policy_paths: Vec<PathBuf>,
    /// Keep only violations of these full rule IDs; empty keeps all.
    pub rule_ids: Vec<String>,
    /// Packs the rule IDs were drawn from.
    pub pack_ids: Vec<String>,
    /// Short ID to full ID.
    pub id_mapping: HashMap<String, String>,
    /// Rule package to the full ID of the rule it defines.
    pub package_rules: HashMap<String, String>,
    /// Pre-loaded policy modules, name to source.
    pub modules: BTreeMap<String, String>,
    /// Pre-loaded helper modules, name to source.
    pub lib_modules: BTreeMap<String, String>,
}

impl EvalOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options that evaluate every rule of `index`.
    ///
    /// Rules with source text are passed in memory; rules known only by
    /// path are loaded from disk.
    #[must_use]
    pub fn from_index(index: &PolicyIndex) -> Self {
        let mut options = Self {
            id_mapping: build_id_mapping(index),
            lib_modules: index.lib_modules().clone(),
            ..Self::default()
        };

        for rule in index.rules() {
            if !rule.package_name.is_empty() {
                options
                    .package_rules
                    .entry(rule.package_name.clone())
                    .or_insert_with(|| rule.id.clone());
            }
            if !rule.content.is_empty() {
                let name = if rule.file_path.as_os_str().is_empty() {
                    rule.id.clone()
                } else {
                    rule.file_path.to_string_lossy().into_owned()
                };
                options.modules.insert(name, rule.content.clone());
            } else if !rule.file_path.as_os_str().is_empty()
                && !options.policy_paths.contains(&rule.file_path)
            {
                options.policy_paths.push(rule.file_path.clone());
            }
        }

        options
    }

    /// Adds a policy file or directory.
    #[must_use]
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_paths.push(path.into());
        self
    }

    /// Sets the rule ID filter.
    #[must_use]
    pub fn with_rule_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the pack IDs.
    #[must_use]
    pub fn with_pack_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pack_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Applies a pattern selection as the rule and pack filter.
    #[must_use]
    pub fn with_selection(self, selection: Selection) -> Self {
        self.with_rule_ids(selection.rule_ids)
            .with_pack_ids(selection.pack_ids)
    }

    /// Sets the short-ID mapping.
    #[must_use]
    pub fn with_id_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.id_mapping = mapping;
        self
    }

    /// Sets the package to rule ID mapping.
    #[must_use]
    pub fn with_package_rules(mut self, mapping: HashMap<String, String>) -> Self {
        self.package_rules = mapping;
        self
    }

    /// Adds pre-loaded policy modules.
    #[must_use]
    pub fn with_modules(mut self, modules: BTreeMap<String, String>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Adds pre-loaded helper modules.
    #[must_use]
    pub fn with_lib_modules(mut self, modules: BTreeMap<String, String>) -> Self {
        self.lib_modules.extend(modules);
        self
    }
}
