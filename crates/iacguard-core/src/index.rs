//! In-memory policy catalog.
//!
//! [`PolicyIndex`] keeps rules and packs in insertion order for stable
//! listings and keyed by ID for lookup. Helper (library) Rego modules are
//! kept by module name. Tiers are combined with the pure
//! [`PolicyIndex::merge`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::policy::{Pack, Rule};

/// Serialized form of [`PolicyIndex`]; positions are rebuilt on load.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRepr {
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    packs: Vec<Pack>,
    #[serde(default)]
    lib_modules: BTreeMap<String, String>,
}

/// Catalog of rules, packs and helper modules.
///
/// Every ID appears exactly once: inserting a record whose ID is already
/// present replaces the existing entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexRepr", into = "IndexRepr")]
pub struct PolicyIndex {
    rules: Vec<Rule>,
    packs: Vec<Pack>,
    rule_positions: HashMap<String, usize>,
    pack_positions: HashMap<String, usize>,
    lib_modules: BTreeMap<String, String>,
}

impl From<IndexRepr> for PolicyIndex {
    fn from(repr: IndexRepr) -> Self {
        let mut index = Self::new();
        for rule in repr.rules {
            index.insert_rule(rule);
        }
        for pack in repr.packs {
            index.insert_pack(pack);
        }
        index.lib_modules = repr.lib_modules;
        index
    }
}

impl From<PolicyIndex> for IndexRepr {
    fn from(index: PolicyIndex) -> Self {
        Self {
            rules: index.rules,
            packs: index.packs,
            lib_modules: index.lib_modules,
        }
    }
}

impl PolicyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rule, replacing any rule with the same ID in place.
    ///
    /// Returns the replaced rule, if any.
    pub fn insert_rule(&mut self, rule: Rule) -> Option<Rule> {
        if let Some(&pos) = self.rule_positions.get(&rule.id) {
            return Some(std::mem::replace(&mut self.rules[pos], rule));
        }
        self.rule_positions.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        None
    }

    /// Inserts a pack, replacing any pack with the same ID in place.
    ///
    /// Returns the replaced pack, if any.
    pub fn insert_pack(&mut self, pack: Pack) -> Option<Pack> {
        if let Some(&pos) = self.pack_positions.get(&pack.id) {
            return Some(std::mem::replace(&mut self.packs[pos], pack));
        }
        self.pack_positions.insert(pack.id.clone(), self.packs.len());
        self.packs.push(pack);
        None
    }

    /// Adds (or replaces) a helper module.
    pub fn insert_lib_module(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.lib_modules.insert(name.into(), source.into());
    }

    /// Looks up a rule by full ID.
    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rule_positions.get(id).map(|&pos| &self.rules[pos])
    }

    /// Looks up a pack by full ID.
    #[must_use]
    pub fn pack(&self, id: &str) -> Option<&Pack> {
        self.pack_positions.get(id).map(|&pos| &self.packs[pos])
    }

    /// Rules in insertion order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Packs in insertion order.
    #[must_use]
    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    /// Helper modules by name.
    #[must_use]
    pub const fn lib_modules(&self) -> &BTreeMap<String, String> {
        &self.lib_modules
    }

    /// Number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of packs.
    #[must_use]
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Returns `true` when the index holds neither rules nor packs.
    ///
    /// Helper modules alone do not make an index usable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.packs.is_empty()
    }

    /// Combines two indexes; entries of `overlay` win on ID collisions.
    ///
    /// Overridden entries keep their position from `base`; new entries are
    /// appended in `overlay` order.
    #[must_use]
    pub fn merge(base: &Self, overlay: &Self) -> Self {
        let mut merged = base.clone();
        for rule in &overlay.rules {
            merged.insert_rule(rule.clone());
        }
        for pack in &overlay.packs {
            merged.insert_pack(pack.clone());
        }
        for (name, source) in &overlay.lib_modules {
            merged.insert_lib_module(name.clone(), source.clone());
        }
        merged
    }
}
