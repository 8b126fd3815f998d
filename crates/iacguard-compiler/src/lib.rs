//! # iacguard Compiler
//!
//! Rego handling for the iacguard compliance scanner.
//!
//! This crate provides functionality for:
//!
//! - Evaluating Rego modules with `regorus` ([`RegoEngine`])
//! - Reading namespaces and rule heads from Rego sources ([`Parser`])
//! - Extracting `rule_meta` / `pack_meta` into catalog records ([`MetadataExtractor`])
//! - Validating rule and pack files with stable error codes ([`PolicyValidator`])
//! - Discovering `.rego` files and helper `lib` directories ([`modules`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use iacguard_compiler::{PolicyValidator, RegoEngine};
//!
//! let mut engine = RegoEngine::new();
//! engine.add_policy("ecs.rego", &std::fs::read_to_string("ecs.rego")?)?;
//! engine.set_input(serde_json::json!({"Resources": {}}))?;
//! let violations = engine.eval("data.iacguard.rules.aliyun.ecs.deny")?;
//!
//! let summary = PolicyValidator::new().validate_directory("policies/")?;
//! println!("{} failed", summary.failed);
//! ```

pub mod engine;
pub mod error;
pub mod metadata;
pub mod modules;
pub mod parser;
pub mod validator;

pub use engine::{EvalResult, PolicyInfo, RegoEngine};
pub use error::{CompilerError, Result};
pub use metadata::{MetadataExtractor, PolicyRecord};
pub use parser::Parser;
pub use validator::{
    FileType, PolicyValidator, ValidationError, ValidationErrorCode, ValidationResult,
    ValidationSummary, ValidatorConfig,
};
