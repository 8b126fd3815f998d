//! Evaluation orchestration.
//!
//! The evaluator assembles the module set from disk and memory, evaluates
//! every rule package's `deny` set against the input document, and
//! post-processes the raw violations:
//!
//! 1. Decode each result item on its own, dropping malformed ones
//! 2. Stamp the full rule ID of the producing package, when known
//! 3. Rewrite remaining short IDs to full IDs
//! 4. Keep only the selected rule IDs (exact match)
//!
//! A second, best-effort pass counts the rules that declare an ID.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use iacguard_compiler::modules::{collect_rego_files, is_rego_file};
use iacguard_compiler::{EvalResult, RegoEngine};
use iacguard_core::PolicyKind;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ScanError};
use crate::options::{EvalOptions, LIB_MODULE_PREFIX};
use crate::violation::{expand_ids, OpaViolation};

/// Result of one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalOutcome {
    /// Violations after ID expansion and filtering.
    pub violations: Vec<OpaViolation>,
    /// Number of rules evaluated.
    pub rule_count: usize,
}

/// Evaluates rule modules against an input document.
///
/// # Example
///
/// ```rust,ignore
/// use iacguard_scan::{EvalOptions, Evaluator};
///
/// let options = EvalOptions::new().with_policy_path("policies/");
/// let outcome = Evaluator::new().evaluate(&options, &serde_json::json!({"Resources": {}}))?;
/// println!("{} violations from {} rules", outcome.violations.len(), outcome.rule_count);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    /// Creates a new evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates `input` against the modules described by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if a policy path is missing or not a `.rego` file, if
    /// there are no modules at all, or if the modules fail to compile.
    #[instrument(skip(self, options, input), fields(paths = options.policy_paths.len()))]
    pub fn evaluate(&self, options: &EvalOptions, input: &Value) -> Result<EvalOutcome> {
        let modules = collect_modules(options)?;
        if modules.is_empty() {
            return Err(ScanError::NoModules);
        }

        let mut engine = RegoEngine::new();
        engine.add_policies(&modules)?;
        engine.set_input(input.clone())?;

        let rule_packages: Vec<String> = engine
            .packages()
            .into_iter()
            .filter(|pkg| PolicyKind::from_namespace(pkg) == Some(PolicyKind::Rule))
            .collect();
        debug!(modules = modules.len(), packages = rule_packages.len(), "Modules loaded");

        let mut violations = Vec::new();
        for package in &rule_packages {
            let mut found = collect_violations(&mut engine, package)?;
            if let Some(rule_id) = options.package_rules.get(package) {
                for violation in &mut found {
                    violation.id.clone_from(rule_id);
                }
            }
            violations.extend(found);
        }

        expand_ids(&mut violations, &options.id_mapping);

        if !options.rule_ids.is_empty() {
            violations.retain(|v| options.rule_ids.contains(&v.id));
        }

        let rule_count = if options.rule_ids.is_empty() {
            count_declared_rules(&mut engine, &rule_packages).unwrap_or_else(|e| {
                warn!(error = %e, "Could not count declared rules");
                0
            })
        } else {
            options.rule_ids.len()
        };

        info!(violations = violations.len(), rule_count, "Evaluation complete");
        Ok(EvalOutcome {
            violations,
            rule_count,
        })
    }
}

/// Merges modules from `policy_paths` with the in-memory ones.
fn collect_modules(options: &EvalOptions) -> Result<BTreeMap<String, String>> {
    let mut modules = BTreeMap::new();

    for path in &options.policy_paths {
        for file in discover(path)? {
            let source = fs::read_to_string(&file).map_err(|e| ScanError::Io {
                path: file.clone(),
                source: e,
            })?;
            modules.insert(file.to_string_lossy().into_owned(), source);
        }
    }

    for (name, source) in &options.modules {
        modules.insert(name.clone(), source.clone());
    }
    for (name, source) in &options.lib_modules {
        modules.insert(format!("{LIB_MODULE_PREFIX}{name}"), source.clone());
    }

    Ok(modules)
}

fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_dir() {
        return Ok(collect_rego_files(path, false)?);
    }
    if !path.exists() {
        return Err(ScanError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    if !is_rego_file(path) {
        return Err(ScanError::NotRegoFile {
            path: path.to_path_buf(),
        });
    }
    Ok(vec![path.to_path_buf()])
}

fn collect_violations(engine: &mut RegoEngine, package: &str) -> Result<Vec<OpaViolation>> {
    let items = match engine.eval(&format!("data.{package}.deny"))? {
        EvalResult::Array(items) => items,
        EvalResult::Undefined => return Ok(Vec::new()),
        other => {
            debug!(package, ?other, "deny is not a set, ignoring");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<OpaViolation>(item) {
            Ok(violation) => Some(violation),
            Err(e) => {
                debug!(package, error = %e, "Dropping malformed violation");
                None
            }
        })
        .collect())
}

fn count_declared_rules(engine: &mut RegoEngine, packages: &[String]) -> Result<usize> {
    let mut count = 0;
    for package in packages {
        if let EvalResult::String(_) = engine.eval(&format!("data.{package}.rule_meta.id"))? {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const FLAG_RULE: &str = r#"package iacguard.rules.test.flag

import rego.v1

rule_meta := {"id": "flag", "name": "Flag", "severity": "low", "reason": "flag is set"}

deny contains result if {
    input.test == true
    result := {
        "id": rule_meta.id,
        "resource_id": "",
        "violation_path": ["test"],
        "meta": {"severity": rule_meta.severity, "reason": rule_meta.reason},
    }
}

deny contains "not a violation" if {
    input.test == true
}
"#;

    const NAMES_RULE: &str = r#"package iacguard.rules.test.names

import rego.v1

import data.iacguard.lib.test.util

rule_meta := {"id": "names", "name": "Names", "severity": "high", "reason": "bad name"}

deny contains result if {
    some name in input.names
    util.is_bad(name)
    result := {"id": rule_meta.id, "resource_id": name, "violation_path": [], "meta": {"severity": "high"}}
}
"#;

    const UTIL: &str = r#"package iacguard.lib.test.util

import rego.v1

is_bad(name) if startswith(name, "tmp")
"#;

    fn options() -> EvalOptions {
        EvalOptions::new()
            .with_modules(BTreeMap::from([
                ("flag.rego".to_string(), FLAG_RULE.to_string()),
                ("names.rego".to_string(), NAMES_RULE.to_string()),
            ]))
            .with_lib_modules(BTreeMap::from([("util.rego".to_string(), UTIL.to_string())]))
    }

    #[test]
    fn test_evaluate_in_memory_modules() {
        let outcome = Evaluator::new()
            .evaluate(&options(), &json!({"test": true, "names": ["tmp-a", "prod", "tmp-b"]}))
            .unwrap();

        let mut ids: Vec<_> = outcome.violations.iter().map(|v| v.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["flag", "names", "names"]);
        assert_eq!(outcome.rule_count, 2);
    }

    #[test]
    fn test_expand_and_filter() {
        let mapping = HashMap::from([
            ("flag".to_string(), "rule:test:flag".to_string()),
            ("names".to_string(), "rule:test:names".to_string()),
        ]);
        let options = options()
            .with_id_mapping(mapping)
            .with_rule_ids(["rule:test:names"]);

        let outcome = Evaluator::new()
            .evaluate(&options, &json!({"test": true, "names": ["tmp-a"]}))
            .unwrap();

        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].id, "rule:test:names");
        assert_eq!(outcome.violations[0].resource_id, "tmp-a");
        assert_eq!(outcome.rule_count, 1);
    }

    #[test]
    fn test_package_rules_take_precedence_over_short_ids() {
        // A short ID shared by two providers must not relabel violations
        // of the package that produced them.
        let mapping = HashMap::from([("flag".to_string(), "rule:other:flag".to_string())]);
        let packages = HashMap::from([(
            "iacguard.rules.test.flag".to_string(),
            "rule:test:flag".to_string(),
        )]);
        let options = options()
            .with_id_mapping(mapping)
            .with_package_rules(packages)
            .with_rule_ids(["rule:test:flag"]);

        let outcome = Evaluator::new()
            .evaluate(&options, &json!({"test": true, "names": []}))
            .unwrap();

        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].id, "rule:test:flag");
    }

    #[test]
    fn test_package_rules_cover_ids_without_short_form() {
        let source = FLAG_RULE.replace(r#""id": "flag""#, r#""id": "flag_rule""#);
        let options = EvalOptions::new()
            .with_modules(BTreeMap::from([("flag.rego".to_string(), source)]))
            .with_package_rules(HashMap::from([(
                "iacguard.rules.test.flag".to_string(),
                "rule:test:flag-rule".to_string(),
            )]))
            .with_rule_ids(["rule:test:flag-rule"]);

        let outcome = Evaluator::new().evaluate(&options, &json!({"test": true})).unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].id, "rule:test:flag-rule");
    }

    #[test]
    fn test_no_modules() {
        let result = Evaluator::new().evaluate(&EvalOptions::new(), &json!({}));
        assert!(matches!(result, Err(ScanError::NoModules)));
    }

    #[test]
    fn test_policy_path_errors() {
        let temp = TempDir::new().unwrap();
        let json_file = temp.path().join("policy.json");
        fs::write(&json_file, "{}").unwrap();

        let missing = EvalOptions::new().with_policy_path(temp.path().join("missing.rego"));
        assert!(matches!(
            Evaluator::new().evaluate(&missing, &json!({})),
            Err(ScanError::PathNotFound { .. })
        ));

        let wrong = EvalOptions::new().with_policy_path(&json_file);
        assert!(matches!(
            Evaluator::new().evaluate(&wrong, &json!({})),
            Err(ScanError::NotRegoFile { .. })
        ));

        let empty_dir = EvalOptions::new().with_policy_path(temp.path());
        assert!(matches!(
            Evaluator::new().evaluate(&empty_dir, &json!({})),
            Err(ScanError::NoModules)
        ));
    }

    #[test]
    fn test_policy_paths_from_disk() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("flag.rego"), FLAG_RULE).unwrap();

        let options = EvalOptions::new().with_policy_path(temp.path().join("flag.rego"));
        let outcome = Evaluator::new().evaluate(&options, &json!({"test": true})).unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.rule_count, 1);
    }
}
