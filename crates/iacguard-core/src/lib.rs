//! # iacguard Core
//!
//! Core types for the iacguard Infrastructure-as-Code compliance scanner.
//!
//! This crate provides the foundational data structures shared by the
//! compiler, loader and scan crates:
//!
//! - [`Rule`] and [`Pack`] - catalog records extracted from Rego sources
//! - [`I18nString`] - plain or language-keyed text with fallback resolution
//! - [`Severity`] - normalized rule severity
//! - [`PolicyIndex`] - ordered, keyed catalog with pure override [`merge`](PolicyIndex::merge)
//! - [`ids`] - canonical ID generation and wildcard ID matching
//!
//! ## Example
//!
//! ```rust
//! use iacguard_core::ids::match_pattern;
//!
//! assert!(match_pattern("rule:aliyun:ecs-*", "rule:aliyun:ecs-instance-no-public-ip"));
//! assert!(!match_pattern("rule:aliyun:ecs-*", "rule:aliyun:rds-instance-enabled-tde"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod i18n;
pub mod ids;
pub mod index;
pub mod policy;

#[cfg(test)]
mod proptest_tests;

pub use error::{Error, Result};
pub use i18n::{I18nString, DEFAULT_LANGUAGE};
pub use ids::{generate_id_prefix, generate_pack_id, generate_rule_id, match_pattern, IdKind};
pub use index::PolicyIndex;
pub use policy::{sort_rules, Pack, PolicyKind, Rule, Severity, NAMESPACE_ROOT};
