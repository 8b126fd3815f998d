//! # iacguard Scan
//!
//! Evaluates compliance rules against an Infrastructure-as-Code template and
//! maps the resulting violations back to template source.
//!
//! - [`select`] turns rule and pack patterns into exact rule IDs
//! - [`EvalOptions`] describes the module set and filters
//! - [`Evaluator`] runs every rule package's `deny` set
//! - [`SourceMapper`] locates violations and attaches snippets and
//!   localized text
//!
//! ## Example
//!
//! ```rust,ignore
//! use iacguard_scan::{select, EvalOptions, Evaluator, MapperConfig, SourceMapper};
//!
//! let selection = select(&index, &["rule:aliyun:ecs-*".to_string()], &[]);
//! let options = EvalOptions::from_index(&index).with_selection(selection);
//! let outcome = Evaluator::new().evaluate(&options, &template)?;
//!
//! let mut mapper = SourceMapper::new(MapperConfig::default());
//! let violations = mapper.enrich(outcome.violations, path, tree.as_ref(), Some(&index));
//! ```

pub mod error;
pub mod evaluator;
pub mod options;
pub mod selection;
pub mod snippet;
pub mod source_map;
pub mod violation;

pub use error::{Result, ScanError};
pub use evaluator::{EvalOutcome, Evaluator};
pub use options::{EvalOptions, LIB_MODULE_PREFIX};
pub use selection::{build_id_mapping, select, Selection};
pub use snippet::{Snippet, SnippetExtractor};
pub use source_map::{locate, MapperConfig, NodeKind, SourceMapper, SourceNode};
pub use violation::{expand_ids, OpaViolation, PathSegment, RichViolation, SnippetLine, ViolationMeta};
