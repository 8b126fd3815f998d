//! OPA/Rego policy engine integration.
//!
//! This module provides a Rust interface to the OPA policy engine using `regorus`,
//! a pure Rust implementation of OPA/Rego. The scanner treats it as a black
//! box: submit modules and an input document, ask for a value, and receive
//! either a decoded result or [`EvalResult::Undefined`].
//!
//! # Examples
//!
//! ```rust,ignore
//! use iacguard_compiler::engine::RegoEngine;
//!
//! let source = std::fs::read_to_string("policies/aliyun/rules/ecs/instance_no_public_ip.rego")?;
//! let mut engine = RegoEngine::new();
//! engine.add_policy("instance_no_public_ip.rego", &source)?;
//! engine.set_input(serde_json::json!({"Resources": {}}))?;
//!
//! let deny = engine.eval("data.iacguard.rules.aliyun.ecs.instance_no_public_ip.deny")?;
//! ```

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{CompilerError, Result};
use crate::parser::{extract_line_from_error, Parser};

/// A Rego policy engine based on `regorus`.
///
/// The engine maintains a collection of modules and an input document, and
/// can evaluate Rego queries against them.
#[derive(Debug)]
pub struct RegoEngine {
    /// The underlying regorus engine.
    inner: regorus::Engine,
    /// Loaded modules by name.
    policies: HashMap<String, PolicyInfo>,
}

/// Information about a loaded module.
#[derive(Debug, Clone)]
pub struct PolicyInfo {
    /// The module's package name.
    pub package: String,
    /// Module name (file path or synthetic name).
    pub name: String,
    /// Names of top-level rules in the module.
    pub rules: Vec<String>,
}

/// Result of evaluating a Rego query.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    /// Boolean result.
    Bool(bool),
    /// String result.
    String(String),
    /// Numeric result.
    Number(f64),
    /// Array result (sets are returned as arrays).
    Array(Vec<Value>),
    /// Object result.
    Object(serde_json::Map<String, Value>),
    /// Undefined (no result).
    Undefined,
}

impl EvalResult {
    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Undefined,
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::String(s),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            Value::Array(arr) => Self::Array(arr),
            Value::Object(obj) => Self::Object(obj),
        }
    }
}

impl Default for RegoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RegoEngine {
    /// Creates a new Rego engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: regorus::Engine::new(),
            policies: HashMap::new(),
        }
    }

    /// Adds a module from source code.
    ///
    /// # Arguments
    ///
    /// * `name` - Name/path of the module (for error messages)
    /// * `source` - Rego source code
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be parsed or lacks a package.
    #[instrument(skip(self, source))]
    pub fn add_policy(&mut self, name: &str, source: &str) -> Result<PolicyInfo> {
        debug!(name, "Adding policy");

        self.inner
            .add_policy(name.to_string(), source.to_string())
            .map_err(|e| {
                let message = e.to_string();
                CompilerError::ParseError {
                    file: name.to_string(),
                    line: extract_line_from_error(&message).unwrap_or(0),
                    message,
                }
            })?;

        let package = Parser::package_name(source).ok_or_else(|| CompilerError::MissingPackage {
            file: name.to_string(),
        })?;

        let info = PolicyInfo {
            package,
            name: name.to_string(),
            rules: Parser::rule_heads(source),
        };

        self.policies.insert(name.to_string(), info.clone());

        Ok(info)
    }

    /// Adds every `(name, source)` module.
    ///
    /// # Errors
    ///
    /// Returns the first parse error encountered.
    pub fn add_policies<'a, I>(&mut self, modules: I) -> Result<Vec<PolicyInfo>>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        modules
            .into_iter()
            .map(|(name, source)| self.add_policy(name, source))
            .collect()
    }

    /// Sets the input document for evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be set.
    pub fn set_input(&mut self, input: Value) -> Result<()> {
        let regorus_value: regorus::Value = input.into();
        self.inner.set_input(regorus_value);
        Ok(())
    }

    /// Evaluates a Rego query and returns the first expression's value.
    ///
    /// # Errors
    ///
    /// Returns an error if the modules fail to compile or the query cannot be
    /// evaluated. An absent value is `Ok(EvalResult::Undefined)`.
    #[instrument(skip(self))]
    pub fn eval(&mut self, query: &str) -> Result<EvalResult> {
        debug!(query, "Evaluating query");

        let results = self
            .inner
            .eval_query(query.to_string(), false)
            .map_err(|e| CompilerError::EvaluationError {
                query: query.to_string(),
                message: e.to_string(),
            })?;

        let Some(value) = results
            .result
            .first()
            .and_then(|r| r.expressions.first())
            .map(|expr| regorus_to_json(&expr.value))
        else {
            return Ok(EvalResult::Undefined);
        };

        Ok(EvalResult::from_json(value))
    }

    /// Distinct packages of all loaded modules, sorted.
    #[must_use]
    pub fn packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = self
            .policies
            .values()
            .map(|info| info.package.clone())
            .collect();
        packages.sort();
        packages.dedup();
        packages
    }
}

#[allow(clippy::cast_possible_truncation)] // Guarded: only whole numbers within i64 range
fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Converts a regorus Value to a `serde_json` Value.
#[allow(clippy::cast_precision_loss)] // Expected: f64 can't represent all i64/u64 values precisely
fn regorus_to_json(value: &regorus::Value) -> Value {
    match value {
        regorus::Value::Null | regorus::Value::Undefined => Value::Null,
        regorus::Value::Bool(b) => Value::Bool(*b),
        regorus::Value::String(s) => Value::String(s.to_string()),
        regorus::Value::Number(n) => n
            .as_f64()
            .or_else(|| n.as_i64().map(|i| i as f64))
            .or_else(|| n.as_u64().map(|u| u as f64))
            .map_or_else(|| Value::Number(0.into()), json_number),
        regorus::Value::Array(arr) => Value::Array(arr.iter().map(regorus_to_json).collect()),
        regorus::Value::Object(obj) => {
            let map: serde_json::Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (object_key(k), regorus_to_json(v)))
                .collect();
            Value::Object(map)
        }
        regorus::Value::Set(set) => Value::Array(set.iter().map(regorus_to_json).collect()),
    }
}

fn object_key(key: &regorus::Value) -> String {
    match key {
        regorus::Value::String(s) => s.to_string(),
        other => regorus_to_json(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULE: &str = r#"
package iacguard.rules.test.flag

import rego.v1

rule_meta := {
    "id": "flag",
    "severity": "low",
    "name": {"en": "Flag check"},
}

deny contains result if {
    input.test == true
    result := {
        "id": rule_meta.id,
        "resource_id": "",
        "violation_path": ["test", 0],
        "meta": {"severity": rule_meta.severity, "reason": "flag is set"},
    }
}
"#;

    #[test]
    fn test_add_policy() {
        let mut engine = RegoEngine::new();
        let info = engine.add_policy("flag.rego", RULE).unwrap();

        assert_eq!(info.package, "iacguard.rules.test.flag");
        assert!(info.rules.contains(&"deny".to_string()));
        assert_eq!(engine.packages(), vec!["iacguard.rules.test.flag".to_string()]);
    }

    #[test]
    fn test_eval_constant_object() {
        let mut engine = RegoEngine::new();
        engine.add_policy("flag.rego", RULE).unwrap();

        let meta = engine.eval("data.iacguard.rules.test.flag.rule_meta").unwrap();
        let EvalResult::Object(meta) = meta else {
            panic!("expected object, got {meta:?}");
        };
        assert_eq!(meta["id"], json!("flag"));
        assert_eq!(meta["name"]["en"], json!("Flag check"));
    }

    #[test]
    fn test_eval_deny_set() {
        let mut engine = RegoEngine::new();
        engine.add_policy("flag.rego", RULE).unwrap();
        engine.set_input(json!({"test": true})).unwrap();

        let result = engine.eval("data.iacguard.rules.test.flag.deny").unwrap();
        let EvalResult::Array(items) = result else {
            panic!("expected array, got {result:?}");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["violation_path"], json!(["test", 0]));
    }

    #[test]
    fn test_eval_missing_value_is_undefined() {
        let mut engine = RegoEngine::new();
        engine.add_policy("flag.rego", RULE).unwrap();

        let result = engine.eval("data.iacguard.rules.test.flag.pack_meta").unwrap();
        assert_eq!(result, EvalResult::Undefined);
    }

    #[test]
    fn test_parse_error() {
        let mut engine = RegoEngine::new();
        let result = engine.add_policy("bad.rego", "not valid rego syntax");

        assert!(matches!(result, Err(CompilerError::ParseError { .. })));
    }

    #[test]
    fn test_json_number() {
        assert_eq!(json_number(3.0), json!(3));
        assert_eq!(json_number(1.5), json!(1.5));
        assert_eq!(json_number(f64::NAN), Value::Null);
    }
}
