//! Rule and pack validation.
//!
//! The validator re-reads each source independently of metadata extraction,
//! so syntax errors are reported even where extraction silently yields
//! nothing. Every applicable check runs: one pass reports every problem in
//! a file.
//!
//! # Example
//!
//! ```rust,ignore
//! use iacguard_compiler::PolicyValidator;
//!
//! let summary = PolicyValidator::new().validate_directory("policies/")?;
//! for result in summary.results.iter().filter(|r| !r.is_valid()) {
//!     for error in &result.errors {
//!         println!("{}: {} ({})", error.file_path.display(), error.message, error.code);
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use iacguard_core::{PolicyKind, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::engine::{EvalResult, RegoEngine};
use crate::error::{CompilerError, Result};
use crate::modules::{collect_rego_files, find_lib_dir_upward, load_modules, MAX_LIB_SEARCH_DEPTH};
use crate::parser::Parser;

/// Stable validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    /// The module does not parse.
    SyntaxError,
    /// The file cannot be read.
    ReadError,
    /// `rule_meta` is absent or not an object.
    RuleMissingMeta,
    /// `rule_meta.id` is absent or empty.
    RuleMissingId,
    /// `rule_meta.name` is absent or empty.
    RuleMissingName,
    /// `rule_meta.severity` is absent.
    RuleMissingSeverity,
    /// `rule_meta.reason` is absent or empty.
    RuleMissingReason,
    /// `rule_meta.severity` is not high, medium or low.
    RuleInvalidSeverity,
    /// A `rule_meta` field has the wrong type.
    RuleInvalidFieldType,
    /// No `deny` rule.
    RuleMissingDeny,
    /// A `deny` result lacks a required field.
    RuleInvalidDenyFormat,
    /// `pack_meta` is absent or not an object.
    PackMissingMeta,
    /// `pack_meta.id` is absent or empty.
    PackMissingId,
    /// `pack_meta.name` is absent or empty.
    PackMissingName,
    /// `pack_meta.rules` is absent or empty.
    PackMissingRules,
    /// A `pack_meta` field has the wrong type.
    PackInvalidFieldType,
}

impl ValidationErrorCode {
    /// Returns the stable string form (e.g. `RULE_MISSING_ID`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::ReadError => "READ_ERROR",
            Self::RuleMissingMeta => "RULE_MISSING_META",
            Self::RuleMissingId => "RULE_MISSING_ID",
            Self::RuleMissingName => "RULE_MISSING_NAME",
            Self::RuleMissingSeverity => "RULE_MISSING_SEVERITY",
            Self::RuleMissingReason => "RULE_MISSING_REASON",
            Self::RuleInvalidSeverity => "RULE_INVALID_SEVERITY",
            Self::RuleInvalidFieldType => "RULE_INVALID_FIELD_TYPE",
            Self::RuleMissingDeny => "RULE_MISSING_DENY",
            Self::RuleInvalidDenyFormat => "RULE_INVALID_DENY_FORMAT",
            Self::PackMissingMeta => "PACK_MISSING_META",
            Self::PackMissingId => "PACK_MISSING_ID",
            Self::PackMissingName => "PACK_MISSING_NAME",
            Self::PackMissingRules => "PACK_MISSING_RULES",
            Self::PackInvalidFieldType => "PACK_INVALID_FIELD_TYPE",
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// File the problem was found in.
    pub file_path: PathBuf,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    /// Stable error code.
    #[serde(rename = "errorCode")]
    pub code: ValidationErrorCode,
    /// Human-readable message.
    pub message: String,
    /// How to fix it.
    pub suggestion: String,
}

/// What kind of policy a file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// A rule file.
    Rule,
    /// A pack file.
    Pack,
    /// Not a rule or pack (skipped).
    Unknown,
}

impl From<PolicyKind> for FileType {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Rule => Self::Rule,
            PolicyKind::Pack => Self::Pack,
        }
    }
}

/// Validation outcome for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Validated file.
    pub file_path: PathBuf,
    /// Detected file type.
    pub file_type: FileType,
    /// Problems, in check order.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            file_type: FileType::Unknown,
            errors: Vec::new(),
        }
    }

    /// Returns whether validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` for files that are neither rules nor packs.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.file_type == FileType::Unknown && self.errors.is_empty()
    }

    /// Returns `true` if an error with `code` was reported.
    #[must_use]
    pub fn has_error(&self, code: ValidationErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    fn push(&mut self, line: usize, code: ValidationErrorCode, message: impl Into<String>, suggestion: impl Into<String>) {
        self.errors.push(ValidationError {
            file_path: self.file_path.clone(),
            line,
            code,
            message: message.into(),
            suggestion: suggestion.into(),
        });
    }
}

/// Aggregate over a directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Files examined.
    pub total: usize,
    /// Rule/pack files without errors.
    pub passed: usize,
    /// Files with at least one error.
    pub failed: usize,
    /// Files that are not rules or packs.
    pub skipped: usize,
    /// Paths of skipped files.
    pub skipped_files: Vec<PathBuf>,
    /// Per-file results, in walk order.
    pub results: Vec<ValidationResult>,
}

impl ValidationSummary {
    /// Records one file result.
    pub fn add(&mut self, result: ValidationResult) {
        self.total += 1;
        if result.is_skipped() {
            self.skipped += 1;
            self.skipped_files.push(result.file_path.clone());
        } else if result.is_valid() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Returns `true` when no file failed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Results of failed files.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.is_valid())
    }
}

/// Configuration for policy validation.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// How many ancestors to search for a `lib` directory.
    pub lib_search_depth: usize,
    /// Whether `deny` results are shape-checked.
    pub check_deny_format: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            lib_search_depth: MAX_LIB_SEARCH_DEPTH,
            check_deny_format: true,
        }
    }
}

impl ValidatorConfig {
    /// Sets the `lib` search depth.
    #[must_use]
    pub const fn with_lib_search_depth(mut self, depth: usize) -> Self {
        self.lib_search_depth = depth;
        self
    }

    /// Sets whether `deny` results are shape-checked.
    #[must_use]
    pub const fn with_deny_format_check(mut self, check: bool) -> Self {
        self.check_deny_format = check;
        self
    }
}

/// Where a metadata field's shape went wrong.
enum FieldState {
    Ok,
    Missing,
    WrongType,
}

/// Checks a field that must be a non-empty string or a non-empty mapping
/// of language to text.
fn i18n_state(value: Option<&Value>) -> FieldState {
    match value {
        None | Some(Value::Null) => FieldState::Missing,
        Some(Value::String(s)) if s.is_empty() => FieldState::Missing,
        Some(Value::String(_)) => FieldState::Ok,
        Some(Value::Object(map)) if map.is_empty() => FieldState::Missing,
        Some(Value::Object(map)) if map.values().all(Value::is_string) => FieldState::Ok,
        Some(_) => FieldState::WrongType,
    }
}

/// Validates Rego rules and packs.
#[derive(Debug, Default)]
pub struct PolicyValidator {
    config: ValidatorConfig,
}

impl PolicyValidator {
    /// Creates a new validator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new validator with the given configuration.
    #[must_use]
    pub const fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validates one file, loading helper modules from the nearest `lib`
    /// directory.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn validate_file(&self, path: impl AsRef<Path>) -> ValidationResult {
        let path = path.as_ref();
        let helpers = path
            .parent()
            .and_then(|dir| find_lib_dir_upward(dir, self.config.lib_search_depth))
            .map(|lib| load_helpers(&lib))
            .unwrap_or_default();
        self.validate_file_with_helpers(path, &helpers)
    }

    fn validate_file_with_helpers(
        &self,
        path: &Path,
        helpers: &BTreeMap<String, String>,
    ) -> ValidationResult {
        match fs::read_to_string(path) {
            Ok(source) => self.validate_source(&source, path, helpers),
            Err(e) => {
                let mut result = ValidationResult::new(path);
                result.push(
                    0,
                    ValidationErrorCode::ReadError,
                    format!("Failed to read file: {e}"),
                    "Check that the file exists and is readable",
                );
                result
            }
        }
    }

    /// Validates every `.rego` file below `dir`, skipping `lib` directories.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` does not exist or cannot be walked.
    #[instrument(skip(self), fields(dir = %dir.as_ref().display()))]
    pub fn validate_directory(&self, dir: impl AsRef<Path>) -> Result<ValidationSummary> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CompilerError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut helper_cache: HashMap<Option<PathBuf>, BTreeMap<String, String>> = HashMap::new();
        let mut summary = ValidationSummary::default();

        for path in collect_rego_files(dir, true)? {
            let lib_dir = path
                .parent()
                .and_then(|parent| find_lib_dir_upward(parent, self.config.lib_search_depth));

            if !helper_cache.contains_key(&lib_dir) {
                let loaded = lib_dir.as_deref().map(load_helpers).unwrap_or_default();
                helper_cache.insert(lib_dir.clone(), loaded);
            }

            summary.add(self.validate_file_with_helpers(&path, &helper_cache[&lib_dir]));
        }

        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Validation complete"
        );
        Ok(summary)
    }

    /// Validates a source string.
    ///
    /// `helpers` are library modules the policy may import.
    #[must_use]
    pub fn validate_source(
        &self,
        source: &str,
        file_path: &Path,
        helpers: &BTreeMap<String, String>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new(file_path);
        let file_name = file_path.to_string_lossy();

        // Step 1: syntax, on the module alone
        if let Err(e) = RegoEngine::new().add_policy(&file_name, source) {
            let line = match &e {
                CompilerError::ParseError { line, .. } => *line,
                _ => 0,
            };
            result.push(
                line,
                ValidationErrorCode::SyntaxError,
                e.to_string(),
                "Check the Rego syntax and the package declaration",
            );
            return result;
        }

        // Step 2: classify by namespace
        let Some(namespace) = Parser::package_name(source) else {
            return result;
        };
        let Some(kind) = PolicyKind::from_namespace(&namespace) else {
            debug!(namespace, "Skipping non-policy module");
            return result;
        };
        result.file_type = kind.into();

        // Step 3: evaluate with helpers
        let mut engine = RegoEngine::new();
        let loaded = engine
            .add_policies(helpers)
            .and_then(|_| engine.add_policy(&file_name, source))
            .and_then(|_| engine.set_input(json!({})));
        if let Err(e) = loaded {
            let code = match kind {
                PolicyKind::Rule => ValidationErrorCode::RuleMissingMeta,
                PolicyKind::Pack => ValidationErrorCode::PackMissingMeta,
            };
            result.push(
                0,
                code,
                format!("Could not load module with its helpers: {e}"),
                "Make sure every imported helper module exists in a lib directory",
            );
            return result;
        }

        let meta_line = Parser::rule_line(source, kind.meta_constant()).unwrap_or(0);
        let meta = engine.eval(&format!("data.{namespace}.{}", kind.meta_constant()));

        match kind {
            PolicyKind::Rule => {
                Self::check_rule_meta(&mut result, meta, meta_line);
                self.check_deny(&mut result, &mut engine, source, &namespace);
            }
            PolicyKind::Pack => Self::check_pack_meta(&mut result, meta, meta_line),
        }

        result
    }

    fn check_rule_meta(result: &mut ValidationResult, meta: Result<EvalResult>, line: usize) {
        use ValidationErrorCode as Code;

        let meta = match meta {
            Ok(EvalResult::Object(meta)) => meta,
            Ok(EvalResult::Undefined) => {
                result.push(
                    line,
                    Code::RuleMissingMeta,
                    "rule_meta is not defined",
                    "Declare rule_meta := {\"id\": ..., \"name\": ..., \"severity\": ..., \"reason\": ...}",
                );
                return;
            }
            Ok(_) => {
                result.push(
                    line,
                    Code::RuleMissingMeta,
                    "rule_meta must be an object",
                    "Declare rule_meta as an object literal",
                );
                return;
            }
            Err(e) => {
                result.push(
                    line,
                    Code::RuleMissingMeta,
                    format!("rule_meta could not be evaluated: {e}"),
                    "Fix the expression that computes rule_meta",
                );
                return;
            }
        };

        match meta.get("id") {
            Some(Value::String(id)) if !id.is_empty() => {}
            Some(Value::String(_) | Value::Null) | None => result.push(
                line,
                Code::RuleMissingId,
                "rule_meta.id is missing or empty",
                "Add a unique id, e.g. \"id\": \"ecs-instance-no-public-ip\"",
            ),
            Some(_) => result.push(
                line,
                Code::RuleInvalidFieldType,
                "rule_meta.id must be a string",
                "Use a string id",
            ),
        }

        Self::check_required_i18n(result, &meta, "name", line, Code::RuleMissingName, Code::RuleInvalidFieldType);

        match meta.get("severity") {
            None | Some(Value::Null) => result.push(
                line,
                Code::RuleMissingSeverity,
                "rule_meta.severity is missing",
                "Add \"severity\": \"high\", \"medium\" or \"low\"",
            ),
            Some(Value::String(s)) if s.parse::<Severity>().is_ok() => {}
            Some(Value::String(s)) => result.push(
                line,
                Code::RuleInvalidSeverity,
                format!("rule_meta.severity '{s}' is not valid"),
                "Use one of: high, medium, low",
            ),
            Some(_) => result.push(
                line,
                Code::RuleInvalidFieldType,
                "rule_meta.severity must be a string",
                "Use one of: \"high\", \"medium\", \"low\"",
            ),
        }

        Self::check_required_i18n(result, &meta, "reason", line, Code::RuleMissingReason, Code::RuleInvalidFieldType);

        for field in ["description", "recommendation"] {
            Self::check_optional_i18n(result, &meta, field, line, Code::RuleInvalidFieldType);
        }
    }

    fn check_deny(
        &self,
        result: &mut ValidationResult,
        engine: &mut RegoEngine,
        source: &str,
        namespace: &str,
    ) {
        use ValidationErrorCode as Code;

        // The head scan only sees column-0 heads; the evaluator has the final say.
        let declared = Parser::has_rule(source, "deny");
        let line = Parser::rule_line(source, "deny").unwrap_or(0);
        let missing = |result: &mut ValidationResult| {
            result.push(
                0,
                Code::RuleMissingDeny,
                "No deny rule found",
                "Add a rule: deny contains result if { ... }",
            );
        };

        let items = match engine.eval(&format!("data.{namespace}.deny")) {
            Ok(EvalResult::Array(items)) => items,
            Ok(EvalResult::Undefined) if !declared => {
                missing(result);
                return;
            }
            Ok(EvalResult::Undefined) => {
                result.push(
                    line,
                    Code::RuleMissingDeny,
                    "deny rule could not be resolved",
                    "Make sure deny is a set rule: deny contains result if { ... }",
                );
                return;
            }
            Ok(_) => {
                result.push(
                    line,
                    Code::RuleInvalidDenyFormat,
                    "deny must be a set of violation objects",
                    "Use deny contains result if { ... }",
                );
                return;
            }
            Err(_) if !declared => {
                missing(result);
                return;
            }
            Err(e) => {
                result.push(
                    line,
                    Code::RuleMissingDeny,
                    format!("deny rule could not be evaluated: {e}"),
                    "Fix the deny rule body",
                );
                return;
            }
        };

        if !self.config.check_deny_format {
            return;
        }
        let Some(first) = items.first() else {
            return;
        };
        let Some(first) = first.as_object() else {
            result.push(
                line,
                Code::RuleInvalidDenyFormat,
                "deny results must be objects",
                "Return {\"id\": ..., \"resource_id\": ..., \"violation_path\": ..., \"meta\": {...}}",
            );
            return;
        };

        for field in ["id", "resource_id", "violation_path", "meta"] {
            if !first.contains_key(field) {
                result.push(
                    line,
                    Code::RuleInvalidDenyFormat,
                    format!("deny result is missing field '{field}'"),
                    format!("Add \"{field}\" to every deny result"),
                );
            }
        }

        if let Some(meta) = first.get("meta") {
            for field in ["severity", "reason"] {
                if meta.get(field).is_none() {
                    result.push(
                        line,
                        Code::RuleInvalidDenyFormat,
                        format!("deny result meta is missing field '{field}'"),
                        format!("Add \"{field}\" to the meta object of every deny result"),
                    );
                }
            }
        }
    }

    fn check_pack_meta(result: &mut ValidationResult, meta: Result<EvalResult>, line: usize) {
        use ValidationErrorCode as Code;

        let meta = match meta {
            Ok(EvalResult::Object(meta)) => meta,
            Ok(EvalResult::Undefined) => {
                result.push(
                    line,
                    Code::PackMissingMeta,
                    "pack_meta is not defined",
                    "Declare pack_meta := {\"id\": ..., \"name\": ..., \"rules\": [...]}",
                );
                return;
            }
            Ok(_) => {
                result.push(
                    line,
                    Code::PackMissingMeta,
                    "pack_meta must be an object",
                    "Declare pack_meta as an object literal",
                );
                return;
            }
            Err(e) => {
                result.push(
                    line,
                    Code::PackMissingMeta,
                    format!("pack_meta could not be evaluated: {e}"),
                    "Fix the expression that computes pack_meta",
                );
                return;
            }
        };

        match meta.get("id") {
            Some(Value::String(id)) if !id.is_empty() => {}
            Some(Value::String(_) | Value::Null) | None => result.push(
                line,
                Code::PackMissingId,
                "pack_meta.id is missing or empty",
                "Add a unique id, e.g. \"id\": \"security-baseline\"",
            ),
            Some(_) => result.push(
                line,
                Code::PackInvalidFieldType,
                "pack_meta.id must be a string",
                "Use a string id",
            ),
        }

        Self::check_required_i18n(result, &meta, "name", line, Code::PackMissingName, Code::PackInvalidFieldType);

        match meta.get("rules") {
            None | Some(Value::Null) => result.push(
                line,
                Code::PackMissingRules,
                "pack_meta.rules is missing",
                "List the rule IDs of this pack in \"rules\"",
            ),
            Some(Value::Array(rules)) if rules.is_empty() => result.push(
                line,
                Code::PackMissingRules,
                "pack_meta.rules is empty",
                "List at least one rule ID",
            ),
            Some(Value::Array(rules)) => {
                if !rules.iter().all(Value::is_string) {
                    result.push(
                        line,
                        Code::PackInvalidFieldType,
                        "pack_meta.rules must contain only strings",
                        "Use rule ID strings",
                    );
                }
            }
            Some(_) => result.push(
                line,
                Code::PackInvalidFieldType,
                "pack_meta.rules must be an array",
                "Use a list: \"rules\": [\"rule-a\", \"rule-b\"]",
            ),
        }

        Self::check_optional_i18n(result, &meta, "description", line, Code::PackInvalidFieldType);
    }

    fn check_required_i18n(
        result: &mut ValidationResult,
        meta: &Map<String, Value>,
        field: &str,
        line: usize,
        missing: ValidationErrorCode,
        wrong_type: ValidationErrorCode,
    ) {
        match i18n_state(meta.get(field)) {
            FieldState::Ok => {}
            FieldState::Missing => result.push(
                line,
                missing,
                format!("{field} is missing or empty"),
                format!("Add \"{field}\" as a string or a language map such as {{\"en\": \"...\"}}"),
            ),
            FieldState::WrongType => result.push(
                line,
                wrong_type,
                format!("{field} must be a string or a language map"),
                format!("Use a string or {{\"en\": \"...\"}} for \"{field}\""),
            ),
        }
    }

    fn check_optional_i18n(
        result: &mut ValidationResult,
        meta: &Map<String, Value>,
        field: &str,
        line: usize,
        wrong_type: ValidationErrorCode,
    ) {
        if let FieldState::WrongType = i18n_state(meta.get(field)) {
            result.push(
                line,
                wrong_type,
                format!("{field} must be a string or a language map"),
                format!("Use a string or {{\"en\": \"...\"}} for \"{field}\""),
            );
        }
    }
}

/// Loads helper modules; an unreadable `lib` directory yields none.
fn load_helpers(lib: &Path) -> BTreeMap<String, String> {
    load_modules(lib).unwrap_or_else(|e| {
        warn!(lib = %lib.display(), error = %e, "Could not load helper modules");
        BTreeMap::new()
    })
}
