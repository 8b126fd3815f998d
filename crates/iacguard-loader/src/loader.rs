//! Per-directory policy loading.
//!
//! A policy root holds one subdirectory per provider, in one of two layouts:
//!
//! ```text
//! policies/                      policies/
//!   aliyun/                        custom/
//!     lib/helpers.rego               no_public_ip.rego
//!     rules/ecs/public_ip.rego       baseline_pack.rego
//!     packs/baseline.rego
//! ```
//!
//! Provider-first directories (with `rules/` or `packs/`) are discovered per
//! child; flat directories hold rules and packs side by side. Helper modules
//! come from a `lib/` child of the discovery directory, or of the provider
//! directory when the former has none.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use iacguard_compiler::modules::{collect_rego_files, is_rego_file, LIB_DIR};
use iacguard_compiler::{MetadataExtractor, PolicyRecord};
use iacguard_core::{PolicyIndex, PolicyKind};
use tracing::{debug, info, instrument, warn};

use crate::error::{LoaderError, Result};

const RULES_DIR: &str = "rules";
const PACKS_DIR: &str = "packs";

/// Loads rules, packs and helper modules from a policy root.
///
/// # Example
///
/// ```rust,ignore
/// use iacguard_loader::PolicyLoader;
///
/// let index = PolicyLoader::new().load("policies/")?;
/// println!("{} rules, {} packs", index.rule_count(), index.pack_count());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    extra_modules: BTreeMap<String, String>,
}

impl PolicyLoader {
    /// Creates a loader without extra modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets extra helper modules appended to every directory's own helpers.
    #[must_use]
    pub fn with_extra_modules(mut self, modules: BTreeMap<String, String>) -> Self {
        self.extra_modules = modules;
        self
    }

    /// Loads every provider directory below `root`.
    ///
    /// Files whose metadata cannot be extracted are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory or cannot be read.
    #[instrument(skip(self), fields(root = %root.as_ref().display()))]
    pub fn load(&self, root: impl AsRef<Path>) -> Result<PolicyIndex> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(LoaderError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut index = PolicyIndex::new();

        for provider_dir in subdirectories(root)? {
            let rules_dir = provider_dir.join(RULES_DIR);
            let packs_dir = provider_dir.join(PACKS_DIR);

            if rules_dir.is_dir() || packs_dir.is_dir() {
                debug!(provider = %provider_dir.display(), "Provider-first layout");
                if rules_dir.is_dir() {
                    self.discover(root, &provider_dir, &rules_dir, Some(PolicyKind::Rule), &mut index)?;
                }
                if packs_dir.is_dir() {
                    self.discover(root, &provider_dir, &packs_dir, Some(PolicyKind::Pack), &mut index)?;
                }
            } else if has_direct_rego_files(&provider_dir)? {
                debug!(provider = %provider_dir.display(), "Flat layout");
                self.discover(root, &provider_dir, &provider_dir, None, &mut index)?;
            } else {
                debug!(dir = %provider_dir.display(), "No policies, skipping");
            }
        }

        info!(
            rules = index.rule_count(),
            packs = index.pack_count(),
            lib_modules = index.lib_modules().len(),
            "Loaded policy directory"
        );
        Ok(index)
    }

    /// Discovers records below `base_dir`, accepting only `accept` when set.
    fn discover(
        &self,
        root: &Path,
        provider_dir: &Path,
        base_dir: &Path,
        accept: Option<PolicyKind>,
        index: &mut PolicyIndex,
    ) -> Result<()> {
        let lib_dir = [base_dir.join(LIB_DIR), provider_dir.join(LIB_DIR)]
            .into_iter()
            .find(|dir| dir.is_dir());

        let helpers = match &lib_dir {
            Some(dir) => load_lib_modules(root, dir)?,
            None => BTreeMap::new(),
        };
        for (name, source) in &helpers {
            index.insert_lib_module(name.clone(), source.clone());
        }

        let mut extractor = MetadataExtractor::new().with_helper_modules(helpers);
        extractor.extend_helper_modules(&self.extra_modules);

        for path in collect_rego_files(base_dir, true)? {
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to read policy file, skipping");
                    continue;
                }
            };

            let record = match extractor.extract(&source, &path, base_dir) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!(file = %path.display(), "No metadata, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Metadata extraction failed, skipping");
                    continue;
                }
            };

            let kind = match &record {
                PolicyRecord::Rule(_) => PolicyKind::Rule,
                PolicyRecord::Pack(_) => PolicyKind::Pack,
            };
            if accept.is_some_and(|expected| expected != kind) {
                warn!(
                    file = %path.display(),
                    found = %kind,
                    "Policy kind does not match its directory, skipping"
                );
                continue;
            }

            let id = record.id().to_string();
            let replaced = match record {
                PolicyRecord::Rule(rule) => index.insert_rule(rule).is_some(),
                PolicyRecord::Pack(pack) => index.insert_pack(pack).is_some(),
            };
            if replaced {
                warn!(id, file = %path.display(), "Duplicate ID, later definition wins");
            }
        }

        Ok(())
    }
}

/// Loads helper modules keyed by their path relative to `root`.
fn load_lib_modules(root: &Path, lib_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut modules = BTreeMap::new();
    for path in collect_rego_files(lib_dir, false)? {
        let source = fs::read_to_string(&path).map_err(|e| LoaderError::Io {
            path: path.clone(),
            source: e,
        })?;
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        modules.insert(name, source);
    }
    Ok(modules)
}

/// Lists subdirectories of `dir` in name order, skipping hidden ones and
/// `lib`.
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| LoaderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LoaderError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() && !name.starts_with('.') && name != LIB_DIR {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn has_direct_rego_files(dir: &Path) -> Result<bool> {
    let entries = fs::read_dir(dir).map_err(|e| LoaderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(entries
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.path().is_file() && is_rego_file(&entry.path())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacguard_core::Severity;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn rule_source(package: &str, id: &str, severity: &str) -> String {
        format!(
            r#"package {package}

import rego.v1

rule_meta := {{"id": "{id}", "name": "{id}", "severity": "{severity}", "reason": "r"}}

deny contains result if {{
    input.never
    result := {{}}
}}
"#
        )
    }

    #[test]
    fn test_load_provider_first_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("aws/lib/names.rego"),
            "package iacguard.lib.aws.names\n\nimport rego.v1\n\nslug := \"s3-encrypted\"\n",
        );
        write(
            &root.join("aws/rules/s3/encrypted.rego"),
            r#"package iacguard.rules.aws.s3.encrypted

import rego.v1

import data.iacguard.lib.aws.names

rule_meta := {"id": names.slug, "name": "S3 encryption", "severity": "HIGH", "reason": "r"}

deny contains result if {
    input.never
    result := {}
}
"#,
        );
        write(
            &root.join("aws/packs/baseline.rego"),
            "package iacguard.packs.aws.baseline\n\npack_meta := {\"id\": \"baseline\", \"name\": \"B\", \"rules\": [\"s3:s3-encrypted\"]}\n",
        );

        let index = PolicyLoader::new().load(root).unwrap();

        let rule = index.rule("rule:aws:s3:s3-encrypted").unwrap();
        assert_eq!(rule.severity, Severity::High);
        assert!(!rule.content.is_empty());

        let pack = index.pack("pack:aws:baseline").unwrap();
        assert_eq!(pack.rule_ids, vec!["rule:aws:s3:s3-encrypted"]);

        assert!(index.lib_modules().contains_key("aws/lib/names.rego"));
    }

    #[test]
    fn test_load_flat_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("custom/no_public_ip.rego"),
            &rule_source("iacguard.rules.custom.no_public_ip", "no-public-ip", "low"),
        );
        write(
            &root.join("custom/mine.rego"),
            "package iacguard.packs.custom.mine\n\npack_meta := {\"id\": \"mine\", \"name\": \"M\", \"rules\": [\"no-public-ip\"]}\n",
        );
        write(&root.join("empty/readme.md"), "nothing here");

        let index = PolicyLoader::new().load(root).unwrap();
        assert_eq!(index.rule_count(), 1);
        assert_eq!(index.pack_count(), 1);
        assert!(index.rule("rule:custom:no-public-ip").is_some());
        assert_eq!(
            index.pack("pack:custom:mine").unwrap().rule_ids,
            vec!["rule:custom:no-public-ip"]
        );
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("gcp/rules/good.rego"),
            &rule_source("iacguard.rules.gcp.good", "good", "medium"),
        );
        write(&root.join("gcp/rules/broken.rego"), "package iacguard.rules.gcp.broken\n\nrule_meta := {\n");
        write(&root.join("gcp/rules/util.rego"), "package gcp.util\n\nx := 1\n");
        write(
            &root.join("gcp/rules/misplaced.rego"),
            "package iacguard.packs.gcp.misplaced\n\npack_meta := {\"id\": \"m\", \"name\": \"M\", \"rules\": [\"good\"]}\n",
        );

        let index = PolicyLoader::new().load(root).unwrap();
        let ids: Vec<_> = index.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rule:gcp:good"]);
        assert_eq!(index.pack_count(), 0);
    }

    #[test]
    fn test_extra_modules_are_available() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("aws/rules/tagged.rego"),
            r#"package iacguard.rules.aws.tagged

import rego.v1

import data.iacguard.lib.shared

rule_meta := {"id": "tagged", "name": shared.label, "severity": "low", "reason": "r"}

deny contains result if {
    input.never
    result := {}
}
"#,
        );

        let without = PolicyLoader::new().load(root).unwrap();
        assert!(without.is_empty());

        let extra = BTreeMap::from([(
            "shared.rego".to_string(),
            "package iacguard.lib.shared\n\nlabel := \"Tagged\"\n".to_string(),
        )]);
        let with = PolicyLoader::new().with_extra_modules(extra).load(root).unwrap();
        assert_eq!(
            with.rule("rule:aws:tagged").unwrap().name.resolve("en"),
            "Tagged"
        );
    }

    #[test]
    fn test_missing_root() {
        let result = PolicyLoader::new().load("/definitely/not/here");
        assert!(matches!(result, Err(LoaderError::DirectoryNotFound { .. })));
    }
}
